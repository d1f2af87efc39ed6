use anyhow::{bail, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// An inline `data:<mime>;base64,<data>` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    /// Still base64-encoded.
    pub data: String,
}

impl DataUrl {
    pub fn encode(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let Some(rest) = s.trim().strip_prefix("data:") else {
            bail!("Invalid base64 image format");
        };
        let Some((mime_type, data)) = rest.split_once(";base64,") else {
            bail!("Invalid base64 image format");
        };
        if mime_type.is_empty() || data.is_empty() {
            bail!("Invalid base64 image format");
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.data)?)
    }
}

impl std::fmt::Display for DataUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}
