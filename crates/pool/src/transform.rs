use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{PoolError, Result};

/// Optional user-supplied XSLT stylesheet applied to a generated pool
/// document before it is submitted to the daemon.
pub struct Stylesheet {
    path: PathBuf,
}

impl Stylesheet {
    pub fn new(path: impl Into<PathBuf>) -> Stylesheet {
        Stylesheet { path: path.into() }
    }

    pub async fn apply(&self, xml: &str) -> Result<String> {
        let mut child = Command::new("xsltproc")
            .arg(&self.path)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| PoolError::Transform(format!("failed to spawn xsltproc: {}", err)))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| PoolError::Transform("xsltproc stdin unavailable".to_string()))?;
        stdin
            .write_all(xml.as_bytes())
            .await
            .map_err(|err| PoolError::Transform(err.to_string()))?;
        drop(stdin);
        let output = child
            .wait_with_output()
            .await
            .map_err(|err| PoolError::Transform(err.to_string()))?;
        if !output.status.success() {
            return Err(PoolError::Transform(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        String::from_utf8(output.stdout)
            .map_err(|err| PoolError::Transform(format!("stylesheet output not utf-8: {}", err)))
    }
}
