//! Reproducible enclave builds.
//!
//! When the configuration carries no measurement targets, the expected
//! values are computed locally by running `get-enclave-id.sh` from the
//! working directory. The script rebuilds the oracle enclaves and
//! prints the SGX unique ID and the Nitro PCR values under known
//! labels.

use tokio::process::Command;

use oracle_verify_core::error::{Result, VerifyError};
use oracle_verify_core::measurement::PCR_COUNT;

const SCRIPT_NAME: &str = "get-enclave-id.sh";

const UNIQUE_ID_LABEL: &str = "Oracle SGX unique ID:";
const PCR_LABEL: &str = "Oracle Nitro PCR:";

const UNIQUE_ID_HEX_LEN: usize = 64;
const PCR_HEX_LEN: usize = 96;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReproducedMeasurements {
    pub unique_id: String,
    pub pcr_values: [String; PCR_COUNT],
}

/// Run the reproducible build script and parse the measurements it
/// prints.
pub async fn reproduce_oracle_measurements() -> Result<ReproducedMeasurements> {
    tracing::info!(script = SCRIPT_NAME, "computing target enclave measurements");

    let output = Command::new("/bin/sh").arg(SCRIPT_NAME).output().await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        return Err(VerifyError::Config(format!(
            "{SCRIPT_NAME} failed to complete: {}\nscript output:\n{stdout}",
            output.status
        )));
    }

    parse_script_output(&stdout)
}

fn parse_script_output(output: &str) -> Result<ReproducedMeasurements> {
    let lines: Vec<&str> = output.lines().collect();

    let unique_id_idx = lines
        .iter()
        .position(|line| *line == UNIQUE_ID_LABEL)
        .filter(|idx| idx + 1 < lines.len())
        .ok_or_else(|| {
            VerifyError::Config("SGX unique ID is not found in the script output".to_string())
        })?;

    let pcr_idx = lines
        .iter()
        .position(|line| *line == PCR_LABEL)
        .filter(|idx| idx + PCR_COUNT < lines.len())
        .ok_or_else(|| {
            VerifyError::Config("Nitro PCR values are not found in the script output".to_string())
        })?;

    let unique_id = lines[unique_id_idx + 1].to_string();
    let pcr_values: [String; PCR_COUNT] = [
        lines[pcr_idx + 1].to_string(),
        lines[pcr_idx + 2].to_string(),
        lines[pcr_idx + 3].to_string(),
    ];

    if unique_id.is_empty() || is_zero_hex(&unique_id) {
        return Err(VerifyError::Config(
            "couldn't compute expected SGX unique ID of the oracle backend".to_string(),
        ));
    }

    if unique_id.len() != UNIQUE_ID_HEX_LEN {
        return Err(VerifyError::Config(format!(
            "{SCRIPT_NAME} returned a SGX unique ID of unexpected length"
        )));
    }

    if pcr_values.iter().any(|pcr| pcr.is_empty() || is_zero_hex(pcr)) {
        return Err(VerifyError::Config(
            "couldn't compute expected Nitro PCR values of the oracle backend, or the enclave is in debug mode"
                .to_string(),
        ));
    }

    if pcr_values.iter().any(|pcr| pcr.len() != PCR_HEX_LEN) {
        return Err(VerifyError::Config(format!(
            "{SCRIPT_NAME} returned Nitro PCR values of unexpected length"
        )));
    }

    Ok(ReproducedMeasurements {
        unique_id,
        pcr_values,
    })
}

fn is_zero_hex(value: &str) -> bool {
    value.bytes().all(|b| b == b'0')
}
