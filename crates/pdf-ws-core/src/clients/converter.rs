use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::Error;
use super::traits::{ConversionOutput, ConversionRequest, Converter};

/// Runs the external PDF-merging script
pub struct ScriptConverter {
    program: PathBuf,
}

impl ScriptConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Converter for ScriptConverter {
    async fn convert(&self, request: &ConversionRequest) -> ConversionOutput {
        let args = request.args();
        debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let err = Error::ConverterSpawn {
                    program: self.program.display().to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                return ConversionOutput {
                    log: err.to_string().into_bytes(),
                    result: Err(err),
                };
            }
        };

        // stdout first, then stderr
        let mut log = output.stdout;
        log.extend_from_slice(&output.stderr);

        let result = if !output.status.success() {
            Err(Error::ConversionFailed(output.status.to_string()))
        } else if tokio::fs::metadata(&request.output).await.is_err() {
            Err(Error::ConversionFailed(format!(
                "converter exited successfully but {} was not created",
                request.output.display()
            )))
        } else {
            info!("Generated PDF: {}", request.output.display());
            Ok(())
        };

        ConversionOutput { log, result }
    }
}
