//! tesseract-backed OCR engine

use super::process::run_with_timeout;
use super::{OcrEngine, ToolError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// OCR engine invoking the system `tesseract` binary, text on stdout
pub struct TesseractOcr {
    binary: PathBuf,
    lang: String,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(binary: PathBuf, lang: String, timeout: Duration) -> Self {
        Self {
            binary,
            lang,
            timeout,
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &Path) -> Result<String, ToolError> {
        let args = vec![
            image.as_os_str().to_owned(),
            OsString::from("stdout"),
            OsString::from("-l"),
            OsString::from(&self.lang),
        ];
        let output = run_with_timeout(&self.binary, &args, self.timeout)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
