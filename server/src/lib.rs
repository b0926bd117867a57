//! Oracle Verification Server
//!
//! Binds the verification engine to an HTTP API. Startup establishes
//! the trust anchor before any traffic is served: measurement targets
//! come from the configuration or a local reproducible build, are
//! asserted against the live contract unless explicitly skipped, and
//! only then does the listener open. Any failure along that path is
//! fatal.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;

use oracle_verify_core::config::Configuration;
use oracle_verify_core::error::{Result, VerifyError};
use oracle_verify_core::measurement::TargetMeasurements;
use oracle_verify_runtime::capability::{QuoteVerifier, SignerWrapper};
use oracle_verify_runtime::simulate::{SimulatedQuoteVerifier, SimulatedSigner};
use oracle_verify_runtime::verifier::Verifier;

pub mod api;
pub mod contract;
pub mod reproducible;

pub use api::AppState;

/// Load configuration, fix the measurement targets, and serve the API.
pub async fn run(config_path: &Path) -> Result<()> {
    let content = tokio::fs::read(config_path).await?;
    let mut conf = Configuration::load(&content)?;

    if !conf.has_measurement_targets() {
        tracing::info!(
            "one or more enclave measurement targets are missing from the configuration, reproducing oracle backend builds"
        );
        let measurements = reproducible::reproduce_oracle_measurements().await?;
        conf.unique_id_target = measurements.unique_id;
        conf.pcr_values_target = measurements.pcr_values.to_vec();
    }

    if conf.live_check.skip {
        tracing::warn!("skipping live contract SGX unique ID and Nitro PCR values check");
    } else {
        assert_live_measurements(&conf).await?;
    }

    tracing::info!(unique_id = %conf.unique_id_target, "expecting oracle backend SGX unique ID");
    tracing::info!(
        pcr_values = %conf.pcr_values_target.join(", "),
        "expecting oracle backend Nitro PCR values"
    );

    let target = TargetMeasurements::from_hex(&conf.unique_id_target, &conf.pcr_values_target)?;

    let (quotes, signer): (Arc<dyn QuoteVerifier>, Arc<dyn SignerWrapper>) = if conf.simulation {
        (
            Arc::new(SimulatedQuoteVerifier::new()),
            Arc::new(SimulatedSigner::new()),
        )
    } else {
        return Err(VerifyError::Config(
            "hardware-backed quote verification is not available in this build; set \"simulation\": true for development use"
                .to_string(),
        ));
    };

    let verifier = Verifier::new(
        target,
        quotes,
        signer,
        conf.price_feed_urls.clone(),
        conf.nitro_verification_time,
    );

    let state = Arc::new(AppState {
        verifier,
        live_check_program: conf.live_check.contract_name.clone(),
        start_time: Utc::now(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], conf.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, api::router(state)).await?;

    Ok(())
}

/// Compare the local measurement targets with the assertions published
/// by the live contract. A mismatch means the local build and the
/// on-chain oracle disagree about what to trust, so it is fatal.
async fn assert_live_measurements(conf: &Configuration) -> Result<()> {
    let client = contract::ContractClient::new(
        &conf.live_check.api_base_url,
        &conf.live_check.contract_name,
    )?;

    tracing::info!(
        contract = %conf.live_check.contract_name,
        api = %conf.live_check.api_base_url,
        "requesting SGX unique ID and Nitro PCR values from the live contract"
    );

    let live_unique_id = client.sgx_unique_id().await?;
    tracing::info!(unique_id = %live_unique_id, "fetched SGX unique ID assertion");

    if live_unique_id != conf.unique_id_target {
        return Err(VerifyError::Config(format!(
            "reproducible SGX build produced a different unique ID than the live contract asserts\nlive: {live_unique_id}\nlocal: {}",
            conf.unique_id_target
        )));
    }

    let live_pcr_values = client.nitro_pcr_values().await?;
    tracing::info!(pcr_values = %live_pcr_values.join(", "), "fetched Nitro PCR values assertion");

    if live_pcr_values[..] != conf.pcr_values_target[..] {
        return Err(VerifyError::Config(format!(
            "reproducible Nitro build produced different PCR values than the live contract asserts\nlive: {}\nlocal: {}",
            live_pcr_values.join(", "),
            conf.pcr_values_target.join(", ")
        )));
    }

    Ok(())
}
