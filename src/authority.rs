//! Authority client session (§4.B): one logical TCP connection to the
//! upstream authority, strictly request/response, no pipelining.

use futures::{SinkExt, TryStreamExt};

use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use tokio_util::codec::Framed;

use tracing::{debug, instrument, warn};

use crate::codec::packets::{create_policy, delete_policy, dial_authority, hello, target_populations, Packet};
use crate::codec::PacketCodec;
use crate::error::CoordinatorError;
use crate::policy::{Action, PolicyId, SiteId, Species};

/// An open, handshaken connection to the authority for a single site's
/// reconciliation. Strictly request/response: each method sends exactly one
/// frame and awaits exactly one reply, bounded by `timeout`.
pub struct AuthoritySession {
    framed: Framed<TcpStream, PacketCodec>,
    timeout: Duration,
}

impl AuthoritySession {
    /// Connects to `addr`, performs the handshake (§4.B.1) and returns a
    /// session ready for `get_targets`/`create_policy`/`delete_policy`.
    ///
    /// # Errors
    /// Returns [`CoordinatorError::AuthorityProtocolError`] if the connect,
    /// handshake or its timeout fails.
    #[instrument(skip(addr))]
    pub async fn connect(
        addr: &str,
        max_frame_len: usize,
        timeout: Duration,
    ) -> Result<Self, CoordinatorError> {
        let stream = TcpStream::connect(addr).await?;
        let mut framed = Framed::new(stream, PacketCodec::with_max_frame_len(max_frame_len));

        framed.send(hello::Packet::standard().into()).await?;

        let reply = tokio::time::timeout(timeout, framed.try_next())
            .await??
            .ok_or_else(|| {
                CoordinatorError::AuthorityProtocolError("authority closed during handshake".to_string())
            })?;

        match reply {
            Packet::Hello(greeting) if greeting.is_valid() => {
                debug!("authority handshake complete");
                Ok(Self { framed, timeout })
            }
            Packet::Hello(greeting) => Err(CoordinatorError::AuthorityProtocolError(format!(
                "unexpected handshake: {greeting:?}"
            ))),
            other => Err(CoordinatorError::AuthorityProtocolError(format!(
                "expected Hello during handshake, got {other:?}"
            ))),
        }
    }

    async fn request(&mut self, request: Packet) -> Result<Packet, CoordinatorError> {
        self.framed.send(request).await?;

        let reply = timeout(self.timeout, self.framed.try_next()).await??;

        match reply {
            Some(Packet::Error(err)) => Err(CoordinatorError::AuthorityRefused(err.message)),
            Some(packet) => Ok(packet),
            None => Err(CoordinatorError::AuthorityProtocolError(
                "authority closed the connection".to_string(),
            )),
        }
    }

    /// `get_targets(site)` (§4.B.2): dials the given site and returns its
    /// target bands, rejecting any reply whose site does not match.
    ///
    /// # Errors
    /// Returns an error on timeout, on an authority `Error` reply, or if the
    /// reply is not a matching `TargetPopulations`.
    #[instrument(skip(self))]
    pub async fn get_targets(
        &mut self,
        site: SiteId,
    ) -> Result<Vec<target_populations::TargetBand>, CoordinatorError> {
        let reply = self
            .request(dial_authority::Packet::new(site).into())
            .await?;

        match reply {
            Packet::TargetPopulations(targets) if targets.site == site => Ok(targets.targets),
            Packet::TargetPopulations(targets) => Err(CoordinatorError::AuthorityProtocolError(
                format!("target populations for site {} but asked for {site}", targets.site),
            )),
            other => Err(CoordinatorError::AuthorityProtocolError(format!(
                "expected TargetPopulations, got {other:?}"
            ))),
        }
    }

    /// `create_policy(species, action)` (§4.B.3).
    ///
    /// # Errors
    /// Returns an error on timeout, on an authority `Error` reply, or if the
    /// reply is not `PolicyResult`.
    #[instrument(skip(self))]
    pub async fn create_policy(
        &mut self,
        species: &Species,
        action: Action,
    ) -> Result<PolicyId, CoordinatorError> {
        let reply = self
            .request(create_policy::Packet::new(species.clone(), action).into())
            .await?;

        match reply {
            Packet::PolicyResult(result) => Ok(result.policy),
            other => Err(CoordinatorError::AuthorityProtocolError(format!(
                "expected PolicyResult, got {other:?}"
            ))),
        }
    }

    /// `delete_policy(policy_id)` (§4.B.4).
    ///
    /// # Errors
    /// Returns an error on timeout, on an authority `Error` reply, or if the
    /// reply is not `OK`.
    #[instrument(skip(self))]
    pub async fn delete_policy(&mut self, policy_id: PolicyId) -> Result<(), CoordinatorError> {
        let reply = self
            .request(delete_policy::Packet::new(policy_id).into())
            .await?;

        match reply {
            Packet::Ok(_) => Ok(()),
            other => {
                warn!("delete_policy({policy_id}) got unexpected reply {other:?}");
                Err(CoordinatorError::AuthorityProtocolError(format!(
                    "expected OK, got {other:?}"
                )))
            }
        }
    }
}
