//! Subprocess adapter for the external face encoder.
//!
//! The detection/embedding model is an external capability: a command
//! that reads one PNG image on stdin and writes a JSON array of
//! detections (`[{"region": {...}, "embedding": {"values": [...]}}]`)
//! on stdout. The daemon never links the model itself.

use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use image::DynamicImage;
use rollcall_core::{Detection, EncoderError, FaceEncoder};

pub struct CommandEncoder {
    cmd: String,
}

impl CommandEncoder {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

impl FaceEncoder for CommandEncoder {
    fn encode(&self, image: &DynamicImage) -> Result<Vec<Detection>, EncoderError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| EncoderError::Failed(format!("png encode: {e}")))?;

        let mut child = Command::new(&self.cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| EncoderError::Unavailable(format!("{}: {e}", self.cmd)))?;

        // stdin is piped, so take() cannot return None.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&png)
                .map_err(|e| EncoderError::Failed(format!("write to encoder: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| EncoderError::Failed(format!("wait for encoder: {e}")))?;

        if !output.status.success() {
            return Err(EncoderError::Failed(format!(
                "{} exited with {}",
                self.cmd, output.status
            )));
        }

        let detections: Vec<Detection> = serde_json::from_slice(&output.stdout)
            .map_err(|e| EncoderError::Failed(format!("bad detections json: {e}")))?;

        tracing::debug!(faces = detections.len(), "encoder returned detections");
        Ok(detections)
    }
}
