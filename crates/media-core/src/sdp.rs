//! Session description for the speaker transcoder
//!
//! The playback process listens on the fixed relay ports described here and
//! decrypts the return audio leg with the session's audio key.

use std::path::{Path, PathBuf};

use doorcam_rtp_core::security::SdesCryptoAttribute;
use doorcam_rtp_core::{SrtpKeyMaterial, SRTP_AES128_CM_SHA1_80};

use crate::error::{MediaError, Result};
use crate::relay::SPEAKER_RTP_PORT;

/// AAC-ELD, 16 kHz mono
const AAC_ELD_CONFIG: &str = "F8EA2000";

/// The return audio stream as seen by the speaker transcoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerSdp {
    /// kbit/s, as negotiated for the audio leg
    pub bitrate: u32,
    pub crypto: SdesCryptoAttribute,
}

impl SpeakerSdp {
    pub fn new(bitrate: u32, srtp: &SrtpKeyMaterial) -> Self {
        Self {
            bitrate,
            crypto: SdesCryptoAttribute::inline(1, &SRTP_AES128_CM_SHA1_80, srtp),
        }
    }

    /// Render the description; lines end with `\n`, the last one does not
    pub fn render(&self) -> String {
        [
            "v=0".to_string(),
            "o=- 0 0 IN IP4 127.0.0.1".to_string(),
            "s=No Name".to_string(),
            "c=IN IP4 127.0.0.1".to_string(),
            "t=0 0".to_string(),
            format!("m=audio {} RTP/AVP 110", SPEAKER_RTP_PORT),
            format!("b=AS:{}", self.bitrate),
            "a=rtpmap:110 MPEG4-GENERIC/16000/1".to_string(),
            format!(
                "a=fmtp:110 profile-level-id=1; mode=AAC-hbr; sizelength=13; indexlength=3; indexdeltalength=3; config={}",
                AAC_ELD_CONFIG
            ),
            self.crypto.to_sdp_line(),
        ]
        .join("\n")
    }

    /// Write the description to `path`
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render())
            .await
            .map_err(|source| MediaError::SdpWrite {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// `<dir>/<camera name>_speaker.sdp`, whitespace runs and separators replaced by `_`
pub fn speaker_sdp_path(dir: &Path, camera: &str) -> PathBuf {
    let mut name = String::with_capacity(camera.len() + 12);
    let mut in_space = false;
    for c in camera.chars() {
        if c.is_whitespace() {
            if !in_space {
                name.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        name.push(if c == '/' || c == '\\' { '_' } else { c });
    }
    name.push_str("_speaker.sdp");
    dir.join(name)
}
