//! Startup gate: block until the channel session is paired and ready.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channels::client::{SessionState, WhatsAppClient};
use crate::relay::scheduler::Sleeper;

/// Poll the session until it reports [`SessionState::Ready`].
///
/// Each new pairing code is logged once so an operator can render and scan
/// it. Errors while polling are logged and retried; this only returns once
/// the session is usable. Returns the number of polls it took.
pub async fn wait_until_ready(
    client: &dyn WhatsAppClient,
    sleeper: &dyn Sleeper,
    poll_interval: Duration,
) -> u32 {
    let mut last_qr: Option<String> = None;
    let mut polls = 0u32;

    loop {
        polls += 1;
        match client.session_state().await {
            Ok(SessionState::Ready) => {
                info!(polls, "Channel session is ready");
                return polls;
            }
            Ok(SessionState::Pairing { qr: Some(qr) }) => {
                if last_qr.as_deref() != Some(qr.as_str()) {
                    info!(qr = %qr, "Channel session needs pairing, scan this code from the phone app");
                    last_qr = Some(qr);
                }
            }
            Ok(SessionState::Pairing { qr: None }) => {
                debug!("Channel session awaiting pairing code");
            }
            Ok(SessionState::Starting) => {
                debug!("Channel session starting");
            }
            Err(e) => {
                warn!(error = %e, "Channel session check failed");
            }
        }

        sleeper.sleep(poll_interval).await;
    }
}
