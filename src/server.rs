//! Server connection handler (§4.E): the per-inbound-connection state
//! machine. Reads framed messages, enforces the handshake before accepting
//! any `SiteVisit`, and drives one reconciliation per visit.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};

use tokio::net::TcpStream;

use tokio_util::codec::Framed;

use tracing::{debug, info, instrument, warn};

use crate::authority::AuthoritySession;
use crate::codec::packets::{error, hello, site_visit, Packet};
use crate::codec::PacketCodec;
use crate::config::Config;
use crate::error::CoordinatorError;
use crate::policy::{Species, SiteId};
use crate::reconcile::{reconcile, Mutation};
use crate::registry::{PolicyEntry, PolicyRegistry};

/// Per-connection state (§3, §4.E). Transitions only forward: once `Ready`,
/// a connection never goes back to `AwaitHello`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    AwaitHello,
    Ready,
}

/// Handles one inbound TCP connection end to end. Closes the socket itself
/// on any fatal error; never panics on malformed client input.
#[instrument(skip(stream, registry, config))]
pub async fn handle_connection(stream: TcpStream, registry: Arc<PolicyRegistry>, config: Arc<Config>) {
    let mut framed = Framed::new(stream, PacketCodec::with_max_frame_len(config.max_frame_len));
    let mut state = ConnectionState::AwaitHello;

    // The server sends its own Hello as soon as the connection opens and
    // separately requires one from the peer before any SiteVisit, in either
    // order (§4.E).
    if let Err(err) = framed.send(hello::Packet::standard().into()).await {
        warn!("failed to send initial Hello: {err}");
        return;
    }

    loop {
        let packet = match framed.next().await {
            Some(Ok(packet)) => packet,
            Some(Err(err)) => {
                debug!("closing connection after decode error: {err}");
                send_error(&mut framed, "invalid frame").await;
                return;
            }
            None => return,
        };

        match (state, packet) {
            (ConnectionState::AwaitHello, Packet::Hello(greeting)) if greeting.is_valid() => {
                debug!("handshake complete");
                state = ConnectionState::Ready;
            }
            (ConnectionState::AwaitHello, packet) => {
                warn!("expected Hello, got {packet:?}");
                send_error(&mut framed, "expected Hello").await;
                return;
            }
            (ConnectionState::Ready, Packet::SiteVisit(visit)) => {
                if let Err(reason) = handle_site_visit(visit, &registry, &config).await {
                    match reason {
                        SiteVisitFailure::ConflictingCounts => {
                            send_error(&mut framed, "conflicting counts").await;
                            return;
                        }
                        SiteVisitFailure::Authority(err) => {
                            // Authority failures are logged and the
                            // connection stays open; the next SiteVisit
                            // reconverges (§4.E, §7).
                            warn!("reconciliation aborted: {err}");
                        }
                    }
                }
            }
            (ConnectionState::Ready, packet) => {
                warn!("unexpected message in Ready state: {packet:?}");
                send_error(&mut framed, "unexpected message").await;
                return;
            }
        }
    }
}

enum SiteVisitFailure {
    ConflictingCounts,
    Authority(CoordinatorError),
}

/// Executes §4.E's `SiteVisit` handling steps 1-7.
#[instrument(skip(visit, registry, config))]
async fn handle_site_visit(
    visit: site_visit::Packet,
    registry: &PolicyRegistry,
    config: &Config,
) -> Result<(), SiteVisitFailure> {
    let observed =
        collapse_observations(&visit.observations).map_err(|()| SiteVisitFailure::ConflictingCounts)?;

    reconcile_site(visit.site, &observed, registry, config)
        .await
        .map_err(SiteVisitFailure::Authority)
}

/// Step 1: duplicate species with equal counts collapse; duplicate species
/// with unequal counts make the whole report malformed (§4.E.1, §3).
fn collapse_observations(
    observations: &[site_visit::Observation],
) -> Result<HashMap<Species, u32>, ()> {
    let mut observed = HashMap::with_capacity(observations.len());

    for obs in observations {
        match observed.entry(obs.species.clone()) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(obs.count);
            }
            std::collections::hash_map::Entry::Occupied(entry) => {
                if *entry.get() != obs.count {
                    return Err(());
                }
            }
        }
    }

    Ok(observed)
}

/// Steps 3-7: acquire the authority session and the site lock, compute and
/// execute the mutation plan, updating the registry as each mutation is
/// acknowledged.
async fn reconcile_site(
    site: SiteId,
    observed: &HashMap<Species, u32>,
    registry: &PolicyRegistry,
    config: &Config,
) -> Result<(), CoordinatorError> {
    let slice_lock = registry.site_lock(site);
    let mut slice = slice_lock.lock().await;

    let mut session =
        AuthoritySession::connect(&config.authority_addr, config.max_frame_len, config.authority_timeout)
            .await?;

    let targets = session.get_targets(site).await?;
    let plan = reconcile(observed, &targets, &slice);

    for mutation in plan {
        match mutation {
            Mutation::Delete(policy_id) => {
                session.delete_policy(policy_id).await?;
                slice.retain(|_, entry| entry.policy_id != policy_id);
            }
            Mutation::Create(species, action) => {
                let policy_id = session.create_policy(&species, action).await?;
                slice.insert(species, PolicyEntry::new(policy_id, action));
            }
        }
    }

    info!("reconciled site {site}");

    Ok(())
}

async fn send_error(framed: &mut Framed<TcpStream, PacketCodec>, message: &str) {
    if let Err(err) = framed.send(error::Packet::new(message).into()).await {
        warn!("failed to send Error({message}): {err}");
    }
}
