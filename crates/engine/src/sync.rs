//! The sync protocol engine.

use crate::filters::{FilterPubsCb, IsExpiredCb};
use crate::pending::PendingInterests;
use crate::scheduler::{schedule, ScopedTimer};
use crate::store::{publication_digest, PubStore, FLAG_LIVE, FLAG_LOCAL};
use crate::subscription::{SubscriptionTable, UpdateCb};
use crate::PubsyncConfig;
use bytes::{Bytes, BytesMut};
use pubsync_api::{
    tlv, DynFace, DynResponseHandler, DynSigner, DynValidator, Interest,
    InterestHandler, Name, PsError, PsResult, Publication, RegisterHandler,
    ResponseHandler, ValidationHandler,
};
use pubsync_iblt::Iblt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Outbound sync requests are replaced this long before their lifetime
/// elapses, riding over propagation and processing delays.
const REISSUE_LEAD: Duration = Duration::from_millis(20);

/// Delay before re-advertising after the member IBLT shrinks without a
/// new publication, so peers learn of the eviction promptly.
const SEND_SOON_DELAY: Duration = Duration::from_millis(3);

type CmdSend = mpsc::UnboundedSender<Cmd>;
type CmdRecv = mpsc::UnboundedReceiver<Cmd>;

enum Cmd {
    Publish(Publication),
    Subscribe(Name, UpdateCb),
    Unsubscribe(Name),
    RegisterOk,
    RegisterFailed(String),
    SyncInterest(Name, Interest),
    ValidData(Interest, Publication),
    SendSync,
    ClearLive(u32),
    EraseDigest(u32),
    Evict(u32),
    IsKnown(u32, oneshot::Sender<bool>),
    IbltSnapshot(oneshot::Sender<Iblt>),
}

#[derive(Debug)]
struct DropAbortHandle {
    name: &'static str,
    handle: tokio::task::AbortHandle,
}

impl Drop for DropAbortHandle {
    fn drop(&mut self) {
        tracing::debug!("aborting: {}", self.name);
        self.handle.abort();
    }
}

/// Synchronizes a lifetime-bounded set of publications among an
/// arbitrary set of peers sharing a sync prefix.
///
/// All engine state lives on a single task; this handle forwards
/// operations to it over a channel, so it is cheap to clone and safe to
/// use from anywhere. Dropping the last clone stops the engine.
#[derive(Debug, Clone)]
pub struct SyncPubsub {
    cmd_send: CmdSend,
    _task: Arc<DropAbortHandle>,
}

impl SyncPubsub {
    /// Construct an engine: registers `sync_prefix` with the face and
    /// starts reconciling as soon as the registration succeeds.
    ///
    /// `is_expired` and `filter_pubs` are the application's policy
    /// callbacks (see [filters](crate::filters) for the reference
    /// implementations); `signer` signs everything this node emits and
    /// `validator` screens everything that arrives.
    pub fn create(
        config: PubsyncConfig,
        face: DynFace,
        sync_prefix: Name,
        is_expired: IsExpiredCb,
        filter_pubs: FilterPubsCb,
        signer: DynSigner,
        validator: DynValidator,
    ) -> PsResult<SyncPubsub> {
        let (cmd_send, cmd_recv) = mpsc::unbounded_channel();

        let handlers = Arc::new(EngineHandlers {
            cmd_send: cmd_send.clone(),
        });
        face.register_prefix(
            sync_prefix.clone(),
            handlers.clone(),
            handlers,
        )?;

        let engine = Engine {
            iblt: Iblt::new(config.expected_num_entries as usize),
            config: Arc::new(config),
            face,
            sync_prefix,
            signer,
            validator,
            is_expired,
            filter_pubs,
            cmd_send: cmd_send.clone(),
            store: PubStore::default(),
            subscriptions: SubscriptionTable::default(),
            pending: PendingInterests::default(),
            current_nonce: 0,
            publications_count: 0,
            interests_sent: 0,
            delivering: false,
            registering: true,
            reissue_timer: None,
        };
        let task = tokio::task::spawn(engine.run(cmd_recv)).abort_handle();

        Ok(SyncPubsub {
            cmd_send,
            _task: Arc::new(DropAbortHandle {
                name: "sync engine",
                handle: task,
            }),
        })
    }

    /// Add a new publication to the synchronized set.
    ///
    /// The publication is signed, published at most once, and lives for
    /// at most the configured publication lifetime. Republishing a
    /// wire-identical publication is ignored with a warning.
    pub fn publish(&self, publication: Publication) {
        let _ = self.cmd_send.send(Cmd::Publish(publication));
    }

    /// Call `cb` for each new publication under `topic` arriving from
    /// some other node.
    ///
    /// An existing subscription to `topic` is replaced.
    pub fn subscribe_to(&self, topic: Name, cb: UpdateCb) {
        let _ = self.cmd_send.send(Cmd::Subscribe(topic, cb));
    }

    /// Remove the subscription to `topic`, if any.
    pub fn unsubscribe(&self, topic: Name) {
        let _ = self.cmd_send.send(Cmd::Unsubscribe(topic));
    }

    /// Schedule a callback after some time.
    ///
    /// Dropping the returned handle cancels it. This lives here so
    /// applications never need their own timer plumbing next to the
    /// engine's.
    pub fn schedule<F>(&self, delay: Duration, cb: F) -> ScopedTimer
    where
        F: FnOnce() + Send + 'static,
    {
        schedule(delay, cb)
    }

    /// Whether a wire-identical publication is currently in the active
    /// set (which covers twice the publication lifetime).
    pub async fn is_known(&self, publication: &Publication) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_send
            .send(Cmd::IsKnown(publication_digest(publication), tx))
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// A copy of the member IBLT as currently advertised. Diagnostics
    /// only.
    pub async fn iblt_snapshot(&self) -> PsResult<Iblt> {
        let (tx, rx) = oneshot::channel();
        self.cmd_send
            .send(Cmd::IbltSnapshot(tx))
            .map_err(|_| PsError::other("sync engine stopped"))?;
        rx.await.map_err(|_| PsError::other("sync engine stopped"))
    }
}

/// Receives face callbacks and forwards them onto the engine task.
#[derive(Debug, Clone)]
struct EngineHandlers {
    cmd_send: CmdSend,
}

impl InterestHandler for EngineHandlers {
    fn on_interest(&self, prefix: &Name, interest: Interest) {
        let _ = self
            .cmd_send
            .send(Cmd::SyncInterest(prefix.clone(), interest));
    }
}

impl RegisterHandler for EngineHandlers {
    fn on_success(&self, prefix: &Name) {
        tracing::info!("sync prefix registered: {}", prefix);
        let _ = self.cmd_send.send(Cmd::RegisterOk);
    }

    fn on_failure(&self, prefix: &Name, reason: String) {
        tracing::error!("register failed for {}: {}", prefix, reason);
        let _ = self.cmd_send.send(Cmd::RegisterFailed(reason));
    }
}

/// Resolution of an outbound sync request: data goes through the
/// validator, nacks and timeouts are logged and left to the re-issue
/// timer.
#[derive(Debug)]
struct SyncResponseHandler {
    cmd_send: CmdSend,
    validator: DynValidator,
}

impl ResponseHandler for SyncResponseHandler {
    fn on_data(&self, interest: &Interest, data: Publication) {
        self.validator.validate(
            data,
            Arc::new(ValidationRelay {
                cmd_send: self.cmd_send.clone(),
                interest: interest.clone(),
            }),
        );
    }

    fn on_nack(&self, interest: &Interest) {
        tracing::info!("nack for {}", interest.name);
    }

    fn on_timeout(&self, interest: &Interest) {
        tracing::info!("timeout for {}", interest.name);
    }
}

#[derive(Debug)]
struct ValidationRelay {
    cmd_send: CmdSend,
    interest: Interest,
}

impl ValidationHandler for ValidationRelay {
    fn on_valid(&self, data: Publication) {
        let _ = self
            .cmd_send
            .send(Cmd::ValidData(self.interest.clone(), data));
    }

    fn on_invalid(&self, data: Publication, reason: PsError) {
        tracing::info!("invalid: {} data {:?}", reason, data);
    }
}

struct Engine {
    config: Arc<PubsyncConfig>,
    face: DynFace,
    sync_prefix: Name,
    signer: DynSigner,
    validator: DynValidator,
    is_expired: IsExpiredCb,
    filter_pubs: FilterPubsCb,
    cmd_send: CmdSend,
    /// The authoritative snapshot of digests currently in the set.
    iblt: Iblt,
    store: PubStore,
    subscriptions: SubscriptionTable,
    pending: PendingInterests,
    /// Nonce of the one outstanding outbound sync request.
    current_nonce: u32,
    /// Monotonic count of local publishes.
    publications_count: u32,
    interests_sent: u32,
    /// True while dispatching publications from a received data packet.
    delivering: bool,
    /// True until the initial prefix registration callback fires.
    registering: bool,
    reissue_timer: Option<ScopedTimer>,
}

impl Engine {
    async fn run(mut self, mut cmd_recv: CmdRecv) {
        while let Some(cmd) = cmd_recv.recv().await {
            if !self.handle_cmd(cmd) {
                break;
            }
        }
        tracing::debug!("sync engine task exiting");
    }

    fn handle_cmd(&mut self, cmd: Cmd) -> bool {
        match cmd {
            Cmd::Publish(publication) => self.publish(publication),
            Cmd::Subscribe(topic, cb) => {
                tracing::info!("subscribe to: {}", topic);
                self.subscriptions.subscribe(topic, cb);
            }
            Cmd::Unsubscribe(topic) => {
                tracing::info!("unsubscribe: {}", topic);
                self.subscriptions.unsubscribe(&topic);
            }
            Cmd::RegisterOk => {
                self.registering = false;
                self.send_sync_interest();
            }
            Cmd::RegisterFailed(reason) => {
                // configuration fatal; the engine cannot operate
                tracing::error!(
                    "terminating sync engine for {}: {}",
                    self.sync_prefix,
                    PsError::registration(reason)
                );
                return false;
            }
            Cmd::SyncInterest(prefix, interest) => {
                self.on_sync_interest(&prefix, interest)
            }
            Cmd::ValidData(interest, data) => {
                self.on_valid_data(&interest, data)
            }
            Cmd::SendSync => self.send_sync_interest(),
            Cmd::ClearLive(digest) => self.store.clear_live(digest),
            Cmd::EraseDigest(digest) => self.on_erase_digest(digest),
            Cmd::Evict(digest) => {
                if let Some(entry) = self.store.remove(digest) {
                    tracing::debug!(
                        "remove from active: {}",
                        entry.handle.name()
                    );
                }
            }
            Cmd::IsKnown(digest, reply) => {
                let _ = reply.send(self.store.is_known(digest));
            }
            Cmd::IbltSnapshot(reply) => {
                let _ = reply.send(self.iblt.clone());
            }
        }
        true
    }

    fn publish(&mut self, mut publication: Publication) {
        if let Err(e) = self.signer.sign(&mut publication) {
            tracing::error!("could not sign {}: {}", publication.name(), e);
            return;
        }
        let digest = publication_digest(&publication);
        if self.store.is_known(digest) {
            tracing::warn!("republish of '{}' ignored", publication.name());
            return;
        }
        tracing::info!("publish: {}", publication.name());
        self.publications_count += 1;
        self.add_to_active(publication, true);
        // the new publication may let us answer pending peer requests
        if !self.delivering {
            self.send_sync_interest();
            self.handle_interests();
        }
    }

    /// Admit a publication to the active set and arm its lifecycle.
    ///
    /// An expired publication is never offered in a response, but its
    /// digest stays in the IBLT for the max clock skew interval so a peer
    /// with a late clock cannot feed it straight back to us, and the
    /// entry itself is held for one further lifetime so replays inside
    /// the skew window still read as known.
    fn add_to_active(
        &mut self,
        publication: Publication,
        local: bool,
    ) -> Arc<Publication> {
        tracing::debug!("add to active: {}", publication.name());
        let digest = publication_digest(&publication);
        let handle = Arc::new(publication);
        self.iblt.insert(digest);

        let lifetime = self.config.max_pub_lifetime();
        let timers = vec![
            self.schedule_cmd(lifetime, Cmd::ClearLive(digest)),
            self.schedule_cmd(
                lifetime + self.config.max_clock_skew(),
                Cmd::EraseDigest(digest),
            ),
            self.schedule_cmd(lifetime * 2, Cmd::Evict(digest)),
        ];
        self.store.insert(digest, handle.clone(), local, timers);
        handle
    }

    fn on_erase_digest(&mut self, digest: u32) {
        // no-op when the entry was already evicted
        if self.store.is_known(digest) {
            self.iblt.erase(digest);
            self.send_sync_interest_soon();
        }
    }

    fn schedule_cmd(&self, delay: Duration, cmd: Cmd) -> ScopedTimer {
        let cmd_send = self.cmd_send.clone();
        schedule(delay, move || {
            let _ = cmd_send.send(cmd);
        })
    }

    /// Express a sync request describing our publication set:
    /// `/<sync-prefix>/<own-IBLT>`.
    fn send_sync_interest(&mut self) {
        // a request sent before the initial registration completes can't
        // be answered; the registration callback sends the first one
        if self.registering {
            return;
        }

        // schedule the replacement; an earlier scheduled send is dropped
        let lead = self
            .config
            .sync_interest_lifetime()
            .saturating_sub(REISSUE_LEAD);
        self.reissue_timer = Some(self.schedule_cmd(lead, Cmd::SendSync));

        let component = self.iblt.encoded_component();
        let component_hash = Iblt::component_hash(&component);

        self.current_nonce = rand::random();
        let mut interest = Interest::new(self.sync_prefix.child(component));
        interest.nonce = self.current_nonce;
        interest.can_be_prefix = true;
        interest.must_be_fresh = true;
        interest.lifetime = self.config.sync_interest_lifetime();

        let response: DynResponseHandler = Arc::new(SyncResponseHandler {
            cmd_send: self.cmd_send.clone(),
            validator: self.validator.clone(),
        });
        if let Err(e) = self.face.express_interest(interest, response) {
            tracing::warn!("could not express sync interest: {}", e);
            return;
        }
        self.interests_sent += 1;
        tracing::debug!(
            "send sync interest {:08x}/{:08x} ({} sent)",
            self.current_nonce,
            component_hash,
            self.interests_sent
        );
    }

    fn send_sync_interest_soon(&mut self) {
        tracing::debug!("send sync interest soon");
        self.reissue_timer =
            Some(self.schedule_cmd(SEND_SOON_DELAY, Cmd::SendSync));
    }

    /// A peer's sync request arrived. Answer it now if we can, otherwise
    /// hold it until we can or it times out.
    fn on_sync_interest(&mut self, prefix: &Name, interest: Interest) {
        if interest.nonce == self.current_nonce {
            // the forwarder looped back our own request
            return;
        }
        tracing::debug!(
            "on sync interest {:08x} {}",
            interest.nonce,
            interest.name
        );
        if interest.name.len() != prefix.len() + 1 {
            tracing::info!("invalid sync interest: {}", interest.name);
            return;
        }
        if !self.handle_interest(&interest.name) {
            let deadline = tokio::time::Instant::now()
                + self.config.sync_interest_lifetime();
            self.pending.insert(interest.name, deadline);
        }
    }

    /// Sweep the pending table: drop entries whose deadline passed or
    /// that can now be satisfied.
    fn handle_interests(&mut self) {
        tracing::debug!("handle pending interests");
        let now = tokio::time::Instant::now();
        for (name, deadline) in self.pending.take_all() {
            if deadline <= now || self.handle_interest(&name) {
                continue;
            }
            self.pending.insert(name, deadline);
        }
    }

    /// Try to answer one sync request. Returns true when the request is
    /// dealt with (answered, or unanswerable and not worth retrying).
    fn handle_interest(&mut self, name: &Name) -> bool {
        let Some(component) = name.last() else {
            return true;
        };
        let peer = match Iblt::decode_component(
            self.config.expected_num_entries as usize,
            component,
        ) {
            Ok(peer) => peer,
            Err(e) => {
                tracing::warn!("{}", e);
                return true;
            }
        };

        // Peeling the difference between our IBLT and the peer's gives
        // two sets: items we have that they lack (positive) and items
        // they have that we lack (negative). A corrupt difference means
        // there is nothing trustworthy to say this round.
        let Some(diff) = (&self.iblt - &peer).list_entries() else {
            return true;
        };
        tracing::debug!(
            "handle interest {:08x}: have {}, need {}",
            Iblt::component_hash(component),
            diff.positive.len(),
            diff.negative.len()
        );

        let mut ours = Vec::new();
        let mut others = Vec::new();
        for digest in &diff.positive {
            if let Some(entry) = self.store.get(*digest) {
                if entry.flags & FLAG_LIVE != 0 {
                    if entry.flags & FLAG_LOCAL != 0 {
                        ours.push(entry.handle.clone());
                    } else {
                        others.push(entry.handle.clone());
                    }
                }
            }
        }

        let selected = (self.filter_pubs)(ours, others);
        if selected.is_empty() {
            return false;
        }

        // pack as many publications as fit the single-response budget;
        // the rest surface on later rounds
        let mut inner = BytesMut::new();
        for p in &selected {
            tracing::debug!("send pub {}", p.name());
            inner.extend_from_slice(&p.wire_encode());
            if inner.len() >= self.config.max_pub_size as usize {
                break;
            }
        }
        let mut content = BytesMut::new();
        tlv::write_tlv(&mut content, tlv::SYNCPS_CONTENT, &inner);
        self.send_sync_data(name, content.freeze());
        true
    }

    fn send_sync_data(&mut self, name: &Name, content: Bytes) {
        tracing::debug!("send sync data: {}", name);
        let mut data = Publication::new(name.clone(), content);
        data.set_freshness(self.config.max_pub_lifetime() / 2);
        if let Err(e) = self.signer.sign(&mut data) {
            tracing::error!("could not sign sync data: {}", e);
            return;
        }
        if let Err(e) = self.face.put(data) {
            tracing::warn!("could not send sync data: {}", e);
        }
    }

    /// A validated sync response arrived: admit everything new, deliver
    /// to subscribers, and replace the consumed sync request.
    fn on_valid_data(&mut self, interest: &Interest, data: Publication) {
        tracing::debug!(
            "on valid data {:08x} {}",
            interest.nonce,
            data.name()
        );

        let mut content = data.content().clone();
        let publications = match tlv::read_tlv(&mut content) {
            Ok((tlv::SYNCPS_CONTENT, inner)) => inner,
            Ok((ty, _)) => {
                tracing::warn!(
                    "sync data with wrong content type {} ignored",
                    ty
                );
                return;
            }
            Err(e) => {
                tracing::warn!("undecodable sync data ignored: {}", e);
                return;
            }
        };

        // hold off answering peer requests until every publication in
        // this data has been delivered
        self.delivering = true;
        let initpubs = self.publications_count;

        let mut rest = publications;
        while !rest.is_empty() {
            let (ty, value) = match tlv::read_tlv(&mut rest) {
                Ok(x) => x,
                Err(e) => {
                    tracing::warn!("truncated publication block: {}", e);
                    break;
                }
            };
            if ty != tlv::DATA {
                tracing::warn!(
                    "sync data with wrong publication type {} ignored",
                    ty
                );
                continue;
            }
            let publication = match Publication::decode_value(value) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("undecodable publication ignored: {}", e);
                    continue;
                }
            };
            if (self.is_expired)(&publication)
                || self.store.is_known(publication_digest(&publication))
            {
                tracing::debug!(
                    "ignore expired or known {}",
                    publication.name()
                );
                continue;
            }
            // deliver to the longest matching subscription
            let handle = self.add_to_active(publication, false);
            match self.subscriptions.longest_prefix_match(handle.name()) {
                Some((topic, cb)) => {
                    tracing::debug!("deliver {} to {}", handle.name(), topic);
                    cb(&handle);
                }
                None => tracing::debug!("no sub for {}", handle.name()),
            }
        }

        self.delivering = false;
        // the data consumed our outstanding request; replace it
        if interest.nonce == self.current_nonce {
            self.send_sync_interest();
        }
        // deliveries may have produced new local publications
        if initpubs != self.publications_count {
            self.handle_interests();
        }
    }
}
