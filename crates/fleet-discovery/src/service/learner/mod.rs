//! # Node Learner
//!
//! Continuously asks known peers ("teachers") what they know and merges the
//! answers into the registry.
//!
//! ## Round
//!
//! 1. Select a teacher (or a seed address if the registry is empty)
//! 2. Send a fleet request, bounded by `request_timeout`
//! 3. Check the responder's identity and certificate
//! 4. Validate every announced peer, pin new certificates
//! 5. Merge survivors in one batch and persist the changed records
//!
//! Failures mark the teacher unreachable and never stop the loop.

mod coalesce;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{
    fingerprint_of, parse_fingerprint, validate_announcement, FleetEvent, FleetRequest,
    FleetState, LearnError, LearningConfig, PeerAnnouncement, PeerIdentity, PeerRecord,
    PeerStatus, RejectReason, RejectedPeer, SocketAddr, StoreError, TeacherResponse, TeacherSelection,
    TeacherSelector, Timestamp, TransportError, ValidationPolicy,
};
use crate::ports::{FleetLearningApi, PeerTransport};

use self::coalesce::InFlight;
use super::certificates::PutOutcome;
use super::context::FleetContext;

/// What one successful exchange with a teacher produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnResult {
    /// The teacher as recorded after the exchange.
    pub teacher: PeerRecord,
    /// Peers inserted or advanced by this exchange.
    pub merged: Vec<PeerRecord>,
    /// Announced peers that failed validation.
    pub rejected: Vec<RejectedPeer>,
    /// Local fleet version after the merge.
    pub fleet_version: u64,
    /// The teacher reported no change since our last exchange.
    pub unchanged: bool,
}

impl LearnResult {
    /// Whether the registry gained or advanced any peer.
    pub fn learned_anything(&self) -> bool {
        !self.merged.is_empty()
    }
}

/// Outcome of one scheduled round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Lonely mode; nothing was contacted.
    Lonely,
    /// Empty registry and no seed configured.
    NoTeacherAvailable,
    /// Every eligible teacher was asked too recently.
    CoolingDown,
    /// A teacher answered.
    Learned(LearnResult),
    /// The chosen teacher or seed failed.
    Failed {
        /// Address contacted.
        teacher: SocketAddr,
        /// Why.
        error: LearnError,
    },
}

impl RoundOutcome {
    /// Whether the round added or advanced any peer.
    pub fn learned_anything(&self) -> bool {
        matches!(self, RoundOutcome::Learned(result) if result.learned_anything())
    }
}

/// The outbound learning capability of a worker.
pub struct NodeLearner {
    ctx: Arc<FleetContext>,
    transport: Arc<dyn PeerTransport>,
    config: LearningConfig,
    seeds: Vec<SocketAddr>,
    selector: Mutex<TeacherSelector>,
    in_flight: InFlight,
    known_checksums: Mutex<HashMap<SocketAddr, String>>,
    next_seed: AtomicUsize,
    idle_rounds: AtomicU32,
    population: watch::Sender<usize>,
}

impl NodeLearner {
    /// Create a learner over `ctx`.
    pub fn new(
        ctx: Arc<FleetContext>,
        transport: Arc<dyn PeerTransport>,
        config: LearningConfig,
    ) -> Self {
        let (population, _) = watch::channel(ctx.registry().len());
        Self {
            selector: Mutex::new(TeacherSelector::new(config.teacher_cooldown)),
            ctx,
            transport,
            config,
            seeds: Vec::new(),
            in_flight: InFlight::default(),
            known_checksums: Mutex::new(HashMap::new()),
            next_seed: AtomicUsize::new(0),
            idle_rounds: AtomicU32::new(0),
            population,
        }
    }

    /// Addresses to contact while no peer is known, tried round-robin from
    /// a random starting order.
    pub fn with_seeds(mut self, mut seeds: Vec<SocketAddr>) -> Self {
        seeds.shuffle(&mut rand::thread_rng());
        self.seeds = seeds;
        self
    }

    /// Shared context.
    pub fn context(&self) -> &Arc<FleetContext> {
        &self.ctx
    }

    /// Number of teacher addresses with a request in flight.
    pub fn requests_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run one round: select a teacher (or seed) and learn from it.
    pub async fn learn_round(&self) -> RoundOutcome {
        if self.ctx.local().mode.lonely {
            return RoundOutcome::Lonely;
        }

        let peers = self.ctx.registry().snapshot();
        let now = self.ctx.now();
        let selection = self
            .selector
            .lock()
            .select(&peers, &self.ctx.local().identity, now);

        match selection {
            TeacherSelection::Selected(teacher) => {
                let address = teacher.network_address;
                match self.learn_from_teacher(teacher).await {
                    Ok(result) => RoundOutcome::Learned(result),
                    Err(error) => RoundOutcome::Failed {
                        teacher: address,
                        error,
                    },
                }
            }
            TeacherSelection::CoolingDown => RoundOutcome::CoolingDown,
            TeacherSelection::NoTeacherAvailable => match self.pick_seed() {
                Some(seed) => match self.learn_from_seed(seed).await {
                    Ok(result) => RoundOutcome::Learned(result),
                    Err(error) => RoundOutcome::Failed {
                        teacher: seed,
                        error,
                    },
                },
                None => RoundOutcome::NoTeacherAvailable,
            },
        }
    }

    /// Background loop: rounds separated by the short delay, or the long
    /// delay after `rounds_before_slowdown` rounds without news.
    ///
    /// Returns when `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if self.ctx.local().mode.lonely {
            info!("Lonely mode: not learning about other workers");
            return;
        }
        info!(
            seeds = self.seeds.len(),
            known = self.ctx.registry().len(),
            "Starting learning loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let outcome = tokio::select! {
                outcome = self.learn_round() => outcome,
                _ = shutdown.changed() => break,
            };
            let delay = self.next_delay(&outcome);
            debug!(?delay, "Learning round finished");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Learning loop stopped");
    }

    /// Delay before the next round, updating the idle-round counter.
    pub fn next_delay(&self, outcome: &RoundOutcome) -> Duration {
        if outcome.learned_anything() {
            self.idle_rounds.store(0, Ordering::Relaxed);
            return self.config.short_delay;
        }
        let idle = self.idle_rounds.fetch_add(1, Ordering::Relaxed) + 1;
        if idle >= self.config.rounds_before_slowdown {
            self.config.long_delay
        } else {
            self.config.short_delay
        }
    }

    fn pick_seed(&self) -> Option<SocketAddr> {
        if self.seeds.is_empty() {
            return None;
        }
        let index = self.next_seed.fetch_add(1, Ordering::Relaxed) % self.seeds.len();
        Some(self.seeds[index])
    }

    async fn contact(
        &self,
        address: SocketAddr,
        expected: Option<PeerRecord>,
    ) -> Result<LearnResult, LearnError> {
        let include_certificate = match &expected {
            Some(teacher) => self.ctx.certificates().get(&teacher.identity)?.is_none(),
            None => true,
        };
        let request = FleetRequest {
            include_certificate,
            known_checksum: self.known_checksums.lock().get(&address).cloned(),
        };

        debug!(addr = %address, "Requesting fleet from teacher");
        let exchange = tokio::time::timeout(
            self.config.request_timeout,
            self.transport.request_fleet(address, request),
        )
        .await
        .unwrap_or(Err(TransportError::Timeout(address)));

        let result = match exchange {
            Ok(reply) => self.absorb(address, expected.as_ref(), reply),
            Err(error) => Err(error.into()),
        };

        match result {
            Err(error) if error.is_teacher_failure() => {
                Err(self.teacher_failed(address, expected.as_ref(), error))
            }
            other => other,
        }
    }

    fn teacher_failed(
        &self,
        address: SocketAddr,
        expected: Option<&PeerRecord>,
        error: LearnError,
    ) -> LearnError {
        let identity = expected.map(|teacher| teacher.identity);
        if let Some(identity) = &identity {
            if let Some(record) = self.ctx.registry().mark_unreachable(identity) {
                warn!(
                    teacher = %record.nickname,
                    addr = %address,
                    failures = record.failure_count,
                    error = %error,
                    "Teacher unreachable"
                );
            }
        } else {
            warn!(addr = %address, error = %error, "Seed unreachable");
        }
        self.ctx.events().publish(FleetEvent::TeacherUnreachable {
            identity,
            address,
            reason: error.to_string(),
        });
        error
    }

    /// Apply a teacher's reply. No await points: a reply is absorbed whole.
    fn absorb(
        &self,
        address: SocketAddr,
        expected: Option<&PeerRecord>,
        reply: TeacherResponse,
    ) -> Result<LearnResult, LearnError> {
        let now = self.ctx.now();
        let local = self.ctx.local();
        let response = reply.response;

        let identity = PeerIdentity::parse(&response.responder.identity)
            .map_err(|e| LearnError::MalformedResponse(format!("responder identity: {e}")))?;
        if let Some(teacher) = expected {
            if teacher.identity != identity {
                return Err(LearnError::TeacherIdentityMismatch {
                    expected: teacher.identity,
                    actual: response.responder.identity.clone(),
                });
            }
        }
        if identity == local.identity {
            return Err(LearnError::SelfTeacher(address));
        }

        let fingerprint = self.verify_teacher_certificate(
            identity,
            &response.responder,
            reply.observed_certificate,
            address,
            now,
        )?;

        let teacher_record = PeerRecord::new(identity, address, fingerprint, now)
            .with_status(PeerStatus::Verified);
        let registry = self.ctx.registry();
        if registry.observe_verified(teacher_record.clone(), now) {
            self.remembered(&teacher_record);
        }
        let teacher = registry.get(&identity).unwrap_or(teacher_record);
        self.known_checksums
            .lock()
            .insert(address, response.fleet_checksum.clone());

        if response.unchanged {
            debug!(teacher = %teacher.nickname, "Teacher reports an unchanged fleet");
            self.persist(std::iter::once(&teacher));
            self.population.send_replace(registry.len());
            return Ok(LearnResult {
                teacher,
                merged: Vec::new(),
                rejected: Vec::new(),
                fleet_version: registry.fleet_state().version,
                unchanged: true,
            });
        }

        let policy = ValidationPolicy {
            local_identity: local.identity,
            allow_unroutable: local.mode.allows_unroutable_peers(),
            now,
        };
        let mut accepted = Vec::with_capacity(response.peers.len());
        let mut rejected = Vec::new();
        for announcement in &response.peers {
            match self.admit(announcement, &policy, address) {
                Ok(record) => accepted.push(record),
                Err(reason) => {
                    debug!(identity = %announcement.identity, %reason, "Rejected announced peer");
                    rejected.push(RejectedPeer {
                        identity: announcement.identity.clone(),
                        reason,
                    });
                }
            }
        }

        let report = registry.merge(accepted);
        for record in &report.inserted {
            self.remembered(record);
        }
        self.persist(report.changed().chain(std::iter::once(&teacher)));
        self.population.send_replace(registry.len());

        let merged: Vec<PeerRecord> = report.changed().cloned().collect();
        info!(
            teacher = %teacher.nickname,
            learned = merged.len(),
            rejected = rejected.len(),
            known = registry.len(),
            "Learned from teacher"
        );
        Ok(LearnResult {
            teacher,
            merged,
            rejected,
            fleet_version: registry.fleet_state().version,
            unchanged: false,
        })
    }

    /// Check the responder's own certificate and pin it on first contact.
    fn verify_teacher_certificate(
        &self,
        identity: PeerIdentity,
        responder: &PeerAnnouncement,
        observed: Option<Vec<u8>>,
        address: SocketAddr,
        now: Timestamp,
    ) -> Result<[u8; 32], LearnError> {
        let fingerprint = parse_fingerprint(&responder.fingerprint)
            .map_err(|e| LearnError::MalformedResponse(e.to_string()))?;
        let announced = if responder.certificate.is_empty() {
            None
        } else {
            Some(responder.certificate_bytes().ok_or_else(|| {
                LearnError::MalformedResponse("teacher certificate is not valid hex".into())
            })?)
        };

        if let Some(der) = &announced {
            if fingerprint_of(der) != fingerprint {
                return Err(LearnError::MalformedResponse(
                    "teacher fingerprint does not match its certificate".into(),
                ));
            }
        }
        if let Some(der) = &observed {
            if fingerprint_of(der) != fingerprint {
                return Err(LearnError::CertificateMismatch);
            }
        }

        let certificates = self.ctx.certificates();
        match announced.or(observed) {
            Some(der) => match certificates.put_if_absent(identity, &der, now)? {
                PutOutcome::Stored(_) | PutOutcome::AlreadyStored(_) => Ok(fingerprint),
                PutOutcome::Conflict { existing, offered } => {
                    self.conflict(identity, existing.fingerprint, offered, address);
                    Err(LearnError::TrustConflict(identity))
                }
            },
            None => match certificates.get(&identity)? {
                Some(pinned) if pinned.fingerprint == fingerprint => Ok(fingerprint),
                Some(pinned) => {
                    self.conflict(identity, pinned.fingerprint, fingerprint, address);
                    Err(LearnError::TrustConflict(identity))
                }
                None => Err(LearnError::MalformedResponse(
                    "teacher did not present a certificate".into(),
                )),
            },
        }
    }

    /// Validate one announced peer and pin its certificate.
    fn admit(
        &self,
        announcement: &PeerAnnouncement,
        policy: &ValidationPolicy,
        reported_by: SocketAddr,
    ) -> Result<PeerRecord, RejectReason> {
        let candidate = validate_announcement(announcement, policy)?;
        let record = candidate.record;
        let certificates = self.ctx.certificates();
        let storage = |e: StoreError| RejectReason::StoreUnavailable(e.to_string());

        match candidate.certificate {
            Some(der) => match certificates
                .put_if_absent(record.identity, &der, policy.now)
                .map_err(storage)?
            {
                PutOutcome::Stored(_) | PutOutcome::AlreadyStored(_) => Ok(record),
                PutOutcome::Conflict { existing, offered } => {
                    self.conflict(record.identity, existing.fingerprint, offered, reported_by);
                    Err(RejectReason::TrustConflict)
                }
            },
            None => match certificates.get(&record.identity).map_err(storage)? {
                Some(pinned) if pinned.fingerprint == record.certificate_fingerprint => Ok(record),
                Some(pinned) => {
                    self.conflict(
                        record.identity,
                        pinned.fingerprint,
                        record.certificate_fingerprint,
                        reported_by,
                    );
                    Err(RejectReason::TrustConflict)
                }
                None => Err(RejectReason::MalformedCertificate(
                    "no certificate supplied for an unpinned peer".into(),
                )),
            },
        }
    }

    fn conflict(
        &self,
        identity: PeerIdentity,
        pinned: [u8; 32],
        offered: [u8; 32],
        reported_by: SocketAddr,
    ) {
        self.ctx.events().publish(FleetEvent::TrustConflict {
            identity,
            pinned,
            offered,
            reported_by,
        });
    }

    fn remembered(&self, record: &PeerRecord) {
        self.ctx.events().publish(FleetEvent::PeerRemembered {
            identity: record.identity,
            nickname: record.nickname.clone(),
            address: record.network_address,
        });
    }

    fn persist<'a>(&self, records: impl IntoIterator<Item = &'a PeerRecord>) {
        if let Err(error) = self.ctx.persist_peers(records) {
            warn!(%error, "Failed to persist learned peers");
        }
    }
}

#[async_trait]
impl FleetLearningApi for NodeLearner {
    async fn learn_now(&self) -> RoundOutcome {
        self.learn_round().await
    }

    async fn learn_from_teacher(&self, teacher: PeerRecord) -> Result<LearnResult, LearnError> {
        if self.ctx.local().mode.lonely {
            return Err(LearnError::Lonely);
        }
        if teacher.identity == self.ctx.local().identity || teacher.status == PeerStatus::Detached
        {
            return Err(LearnError::TeacherNotEligible(teacher.identity));
        }
        let address = teacher.network_address;
        self.in_flight
            .run(address, || self.contact(address, Some(teacher)))
            .await
    }

    async fn learn_from_seed(&self, address: SocketAddr) -> Result<LearnResult, LearnError> {
        if self.ctx.local().mode.lonely {
            return Err(LearnError::Lonely);
        }
        if address == self.ctx.local().address {
            return Err(LearnError::SelfTeacher(address));
        }
        self.in_flight
            .run(address, || self.contact(address, None))
            .await
    }

    async fn wait_for_peers(&self, count: usize, timeout: Duration) -> bool {
        let mut population = self.population.subscribe();
        let reached = tokio::time::timeout(timeout, population.wait_for(|known| *known >= count))
            .await
            .is_ok_and(|waited| waited.is_ok());
        reached
    }

    fn known_peers(&self) -> Vec<PeerRecord> {
        self.ctx.registry().snapshot()
    }

    fn fleet_state(&self) -> FleetState {
        self.ctx.registry().fleet_state()
    }
}
