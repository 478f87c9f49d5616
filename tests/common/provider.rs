//! Stub implementations of the pluggable components that record every call made into them in a shared
//! [`Journal`].

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use committee_rs::{
    error::{DialError, TransportError},
    node_table::PeerAddress,
    pluggables::{AddrBook, CommitteeProvider, ConsensusState, HealthManager, NodeInfo, Switch},
    status::VoteSummary,
    types::{
        committee::{CommitteeInfo, CommitteeMember},
        data_types::{BlockHeight, CommitteeID},
        identity::{Address, PeerID},
        validators::{Validator, ValidatorSet},
    },
};
use ed25519_dalek::{SigningKey, VerifyingKey};

/// A call into one of the stub components of a committee.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    NewConsensus(CommitteeID, BlockHeight, usize),
    AttachReactor(CommitteeID),
    SetSigningKey(CommitteeID),
    UpdateValidatorSet(CommitteeID, usize),
    SetEndHeight(CommitteeID, BlockHeight),
    SetNodeInfo(CommitteeID, NodeInfo),
    SwitchStart(CommitteeID),
    SwitchStop(CommitteeID),
    Dial(CommitteeID, PeerAddress),
    AddOurAddress(CommitteeID, PeerAddress),
    AddPrivateIds(CommitteeID, usize),
    WorkHealth(CommitteeID, PeerID),
    BackHealth(CommitteeID, PeerID),
    HealthInfo(CommitteeID, PeerID, String, u16),
    HealthUpdate(CommitteeID, usize, usize),
    HealthStart(CommitteeID),
    HealthStop(CommitteeID),
}

/// Shared, ordered record of calls.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|call| pred(call)).count()
    }

    pub(crate) fn contains(&self, call: &Call) -> bool {
        self.0.lock().unwrap().contains(call)
    }

    /// Get the addresses dialed by `committee`'s transport, in the order they were dialed.
    pub(crate) fn dials(&self, committee: CommitteeID) -> Vec<PeerAddress> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                Call::Dial(id, address) if *id == committee => Some(address.clone()),
                _ => None,
            })
            .collect()
    }

    /// Poll until `pred` holds for the recorded calls, for at most `timeout`. Returns whether it held.
    pub(crate) fn wait_until(&self, timeout: Duration, pred: impl Fn(&[Call]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.0.lock().unwrap()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

/// How the transports allocated by a [`StubProvider`] behave. Shared by every component it allocates,
/// so changes apply to committees that are already registered.
#[derive(Default)]
struct Behavior {
    refused: Mutex<HashSet<PeerID>>,
    fail_start: AtomicBool,
    listen_before_failing: AtomicBool,
    dial_delay: Mutex<Duration>,
    health_delay: Mutex<Duration>,
}

/// Allocates stub components that all record into the same [`Journal`].
#[derive(Clone)]
pub(crate) struct StubProvider {
    pub(crate) journal: Journal,
    me: Address,
    behavior: Arc<Behavior>,
}

impl StubProvider {
    /// Create a provider for the node whose address is `me`. The consensus stubs it allocates halt when
    /// `me` is not in an updated validator set.
    pub(crate) fn new(me: Address) -> StubProvider {
        StubProvider {
            journal: Journal::default(),
            me,
            behavior: Arc::new(Behavior::default()),
        }
    }

    /// Make every dial to `peer` fail until [`accept`](Self::accept) is called.
    pub(crate) fn refuse(&self, peer: PeerID) {
        self.behavior.refused.lock().unwrap().insert(peer);
    }

    pub(crate) fn accept(&self, peer: &PeerID) {
        self.behavior.refused.lock().unwrap().remove(peer);
    }

    /// Make every transport fail to start until [`repair_transport_start`](Self::repair_transport_start)
    /// is called.
    pub(crate) fn fail_transport_start(&self) {
        self.behavior.fail_start.store(true, Ordering::SeqCst)
    }

    /// Like [`fail_transport_start`](Self::fail_transport_start), but the transport is left running
    /// when it reports the failure.
    pub(crate) fn fail_transport_start_after_listening(&self) {
        self.behavior.listen_before_failing.store(true, Ordering::SeqCst);
        self.behavior.fail_start.store(true, Ordering::SeqCst)
    }

    pub(crate) fn repair_transport_start(&self) {
        self.behavior.fail_start.store(false, Ordering::SeqCst);
        self.behavior.listen_before_failing.store(false, Ordering::SeqCst)
    }

    /// Make every dial take `delay` before it completes.
    pub(crate) fn slow_down_dials(&self, delay: Duration) {
        *self.behavior.dial_delay.lock().unwrap() = delay
    }

    /// Make every endpoint handed to a health manager take `delay` to record.
    pub(crate) fn slow_down_health_updates(&self, delay: Duration) {
        *self.behavior.health_delay.lock().unwrap() = delay
    }
}

impl CommitteeProvider for StubProvider {
    type Consensus = StubConsensus;
    type Switch = StubSwitch;
    type AddrBook = StubAddrBook;
    type Health = StubHealth;

    fn new_consensus_state(
        &self,
        committee: CommitteeID,
        start_height: BlockHeight,
        validator_set: &ValidatorSet,
    ) -> StubConsensus {
        self.journal
            .push(Call::NewConsensus(committee, start_height, validator_set.len()));
        StubConsensus {
            committee,
            me: self.me,
            height: start_height,
            journal: self.journal.clone(),
        }
    }

    fn new_switch(&self, committee: CommitteeID) -> StubSwitch {
        StubSwitch {
            committee,
            running: Arc::new(AtomicBool::new(false)),
            behavior: self.behavior.clone(),
            journal: self.journal.clone(),
        }
    }

    fn new_addr_book(&self, committee: CommitteeID) -> StubAddrBook {
        StubAddrBook {
            committee,
            journal: self.journal.clone(),
        }
    }

    fn new_health_manager(&self, committee: CommitteeID) -> StubHealth {
        StubHealth {
            committee,
            behavior: self.behavior.clone(),
            journal: self.journal.clone(),
        }
    }

    fn attach_consensus_reactor(
        &self,
        consensus: &mut StubConsensus,
        _switch: &mut StubSwitch,
        _health: &mut StubHealth,
    ) {
        self.journal.push(Call::AttachReactor(consensus.committee))
    }
}

pub(crate) struct StubConsensus {
    committee: CommitteeID,
    me: Address,
    height: BlockHeight,
    journal: Journal,
}

impl ConsensusState for StubConsensus {
    fn height(&self) -> BlockHeight {
        self.height
    }

    fn votes(&self) -> VoteSummary {
        VoteSummary {
            round: 1,
            prevotes: 2,
            precommits: 0,
        }
    }

    fn set_signing_key(&mut self, _key: SigningKey) {
        self.journal.push(Call::SetSigningKey(self.committee))
    }

    fn update_validator_set(&mut self, _committee: &CommitteeInfo, validator_set: &ValidatorSet) -> bool {
        self.journal
            .push(Call::UpdateValidatorSet(self.committee, validator_set.len()));
        !validator_set.has_address(&self.me)
    }

    fn set_end_height(&mut self, height: BlockHeight) {
        self.journal.push(Call::SetEndHeight(self.committee, height))
    }
}

#[derive(Clone)]
pub(crate) struct StubSwitch {
    committee: CommitteeID,
    running: Arc<AtomicBool>,
    behavior: Arc<Behavior>,
    journal: Journal,
}

impl Switch for StubSwitch {
    fn set_node_info(&mut self, node_info: NodeInfo) {
        self.journal.push(Call::SetNodeInfo(self.committee, node_info))
    }

    fn set_node_key(&mut self, _key: SigningKey) {}

    fn start(&mut self) -> Result<(), TransportError> {
        if self.behavior.fail_start.load(Ordering::SeqCst) {
            if self.behavior.listen_before_failing.load(Ordering::SeqCst) {
                self.running.store(true, Ordering::SeqCst);
            }
            return Err(TransportError("address in use".to_string()));
        }
        self.journal.push(Call::SwitchStart(self.committee));
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.journal.push(Call::SwitchStop(self.committee));
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn dial_peer(&mut self, address: &PeerAddress) -> Result<(), DialError> {
        self.journal.push(Call::Dial(self.committee, address.clone()));
        let delay = *self.behavior.dial_delay.lock().unwrap();
        thread::sleep(delay);
        if self.behavior.refused.lock().unwrap().contains(&address.id) {
            return Err(DialError("connection refused".to_string()));
        }
        Ok(())
    }
}

pub(crate) struct StubAddrBook {
    committee: CommitteeID,
    journal: Journal,
}

impl AddrBook for StubAddrBook {
    fn add_our_address(&mut self, address: &PeerAddress) {
        self.journal
            .push(Call::AddOurAddress(self.committee, address.clone()))
    }

    fn add_private_ids(&mut self, ids: &[PeerID]) {
        self.journal.push(Call::AddPrivateIds(self.committee, ids.len()))
    }
}

pub(crate) struct StubHealth {
    committee: CommitteeID,
    behavior: Arc<Behavior>,
    journal: Journal,
}

impl HealthManager for StubHealth {
    fn put_work_health(&mut self, id: PeerID, _validator: Validator) {
        self.journal.push(Call::WorkHealth(self.committee, id))
    }

    fn put_back_health(&mut self, id: PeerID, _validator: Validator) {
        self.journal.push(Call::BackHealth(self.committee, id))
    }

    fn update_health_info(&mut self, id: &PeerID, ip: &str, port: u16, _public_key: &VerifyingKey) {
        self.journal
            .push(Call::HealthInfo(self.committee, id.clone(), ip.to_string(), port));
        let delay = *self.behavior.health_delay.lock().unwrap();
        thread::sleep(delay);
    }

    fn update_from_committee(&mut self, members: &[CommitteeMember], back_members: &[CommitteeMember]) {
        self.journal.push(Call::HealthUpdate(
            self.committee,
            members.len(),
            back_members.len(),
        ))
    }

    fn on_start(&mut self) {
        self.journal.push(Call::HealthStart(self.committee))
    }

    fn on_stop(&mut self) {
        self.journal.push(Call::HealthStop(self.committee))
    }
}
