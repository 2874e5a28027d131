use parking_lot::{ArcMutexGuard, ArcRwLockReadGuard, Mutex, RawMutex, RawRwLock, RwLock};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    commands::{AppliedVersion, Command, Query, QueryResult},
    config::TopologyConfig,
    error::TopologyError,
    event::TopologyEvent,
    eventlog::{EventStore, FileEventStore, LogRecord, MemoryEventStore, StreamAppend},
    properties::{
        EndKind, JunctionId, LineId, LineKind, RouteNodeId, RouteSegmentId, SegmentId, Uuid,
        WalkId,
    },
    route::RouteNetwork,
    topology::{
        junction::Junction,
        line::{LineInfo, SegmentInfo},
        projection::Projection,
        relation::{RelationFilter, SegmentRelation},
        traversal::TraversalNode,
    },
};

/// The entry point for all topology commands and queries.
///
/// A store owns the event log and the projection folded from it. Writers lock the lines they
/// touch, validate against the current projection, append to the log with the expected stream
/// versions and then apply the stored records under a short exclusive lock. Readers only ever
/// take the shared lock, so they observe a projection either before or after a command, never in
/// between.
pub struct TopologyStore {
    config: TopologyConfig,
    network: Arc<dyn RouteNetwork>,
    log: Mutex<Box<dyn EventStore>>,
    projection: Arc<RwLock<Projection>>,
    line_locks: Mutex<BTreeMap<LineId, Arc<Mutex<()>>>>,
    tx: Option<UnboundedSender<TopologyEvent>>,
}

impl TopologyStore {
    /// Open a store using the event log named by `config`, or an in-memory log when none is set.
    pub fn new(
        network: Arc<dyn RouteNetwork>,
        config: TopologyConfig,
    ) -> Result<TopologyStore, TopologyError> {
        let log: Box<dyn EventStore> = match &config.event_log {
            Some(path) => Box::new(FileEventStore::open(path)?),
            None => Box::new(MemoryEventStore::new()),
        };
        TopologyStore::with_event_store(network, log, config)
    }

    /// Build a store over an existing event log, replaying it into a fresh projection.
    pub fn with_event_store(
        network: Arc<dyn RouteNetwork>,
        log: Box<dyn EventStore>,
        config: TopologyConfig,
    ) -> Result<TopologyStore, TopologyError> {
        let records = log.records()?;
        let projection = Projection::replay(config.direction, &records, network.as_ref())?;
        Ok(TopologyStore {
            config,
            network,
            log: Mutex::new(log),
            projection: Arc::new(RwLock::new(projection)),
            line_locks: Mutex::new(BTreeMap::new()),
            tx: None,
        })
    }

    /// Publish [TopologyEvent]s to `tx` after every applied change.
    pub fn with_notifications(mut self, tx: UnboundedSender<TopologyEvent>) -> Self {
        self.tx = Some(tx);
        self
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    pub fn network(&self) -> &Arc<dyn RouteNetwork> {
        &self.network
    }

    /// A shared view of the projection. Holding it blocks writers from applying changes.
    pub fn snapshot(&self) -> ArcRwLockReadGuard<RawRwLock, Projection> {
        self.projection.read_arc()
    }

    pub fn stream_version(&self, line: &LineId) -> u64 {
        self.log.lock().stream_version(line)
    }

    pub fn records(&self) -> Result<Vec<LogRecord>, TopologyError> {
        self.log.lock().records()
    }

    fn notify(&self, event: TopologyEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(event) {
                tracing::debug!("Dropping topology notification, receiver closed: {e}");
            }
        }
    }

    /// Lock every line in `ids`, in id order.
    fn lock_lines(&self, ids: &[LineId]) -> Vec<ArcMutexGuard<RawMutex, ()>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let locks = {
            let mut table = self.line_locks.lock();
            ids.iter()
                .map(|id| table.entry(*id).or_default().clone())
                .collect::<Vec<_>>()
        };
        locks.iter().map(|lock| lock.lock_arc()).collect()
    }

    fn commit(&self, batch: Vec<StreamAppend>) -> Result<Vec<AppliedVersion>, TopologyError> {
        let mut log = self.log.lock();
        let records = log.append_batch(batch)?;
        {
            let mut projection = self.projection.write();
            for record in records.iter() {
                if let Err(e) = projection.apply(record, self.network.as_ref()) {
                    tracing::warn!(
                        "Record {} was stored but could not be applied: {e}. \
                         Reload the store to resynchronize.",
                        record.position
                    );
                    return Err(e);
                }
            }
        }
        drop(log);

        let mut latest = BTreeMap::new();
        for record in records.iter() {
            latest.insert(record.line, record.version);
        }
        let applied = latest
            .into_iter()
            .map(|(line, version)| AppliedVersion { line, version })
            .collect::<Vec<_>>();
        for version in applied.iter() {
            self.notify(TopologyEvent::LineUpdated {
                line: version.line,
                version: version.version,
            });
        }
        Ok(applied)
    }

    fn single(applied: Vec<AppliedVersion>, line: LineId) -> Result<AppliedVersion, TopologyError> {
        applied
            .into_iter()
            .find(|v| v.line == line)
            .ok_or_else(|| TopologyError::NotFound(format!("applied version of line {line}")))
    }

    pub fn place_line(
        &self,
        id: LineId,
        walk: WalkId,
        kind: LineKind,
        parent: Option<LineId>,
        sequence_number: Option<u16>,
        name: &str,
    ) -> Result<AppliedVersion, TopologyError> {
        let mut lock_ids = vec![id];
        lock_ids.extend(parent);
        let _guards = self.lock_lines(&lock_ids);
        let append = {
            let projection = self.projection.read();
            projection.plan_place_line(
                id,
                walk,
                kind,
                parent,
                sequence_number,
                name,
                self.network.as_ref(),
            )?
        };
        tracing::debug!("[TopologyStore] placing {kind} {id}");
        TopologyStore::single(self.commit(vec![append])?, id)
    }

    /// Place a multi-conduit and its inner conduits in one atomic append.
    pub fn place_multi_conduit(
        &self,
        id: LineId,
        walk: WalkId,
        inner_conduit_count: u16,
        name: &str,
    ) -> Result<Vec<AppliedVersion>, TopologyError> {
        let mut lock_ids = vec![id];
        lock_ids.extend((1..=inner_conduit_count).map(|seq| LineId::inner_conduit(id, seq)));
        let _guards = self.lock_lines(&lock_ids);
        let batch = {
            let projection = self.projection.read();
            projection.plan_place_multi_conduit(
                id,
                walk,
                inner_conduit_count,
                name,
                self.network.as_ref(),
            )?
        };
        tracing::debug!("[TopologyStore] placing multi-conduit {id} with {inner_conduit_count} inner conduits");
        self.commit(batch)
    }

    fn resolve_target(
        &self,
        line: &LineId,
        sequence_number: Option<u16>,
    ) -> Result<LineId, TopologyError> {
        Ok(self.projection.read().target_line(line, sequence_number)?.id)
    }

    /// Cut `line` (or its inner conduit `sequence_number`) at `point`.
    pub fn cut(
        &self,
        line: LineId,
        sequence_number: Option<u16>,
        point: RouteNodeId,
        expected_version: Option<u64>,
    ) -> Result<AppliedVersion, TopologyError> {
        let target = self.resolve_target(&line, sequence_number)?;
        let _guards = self.lock_lines(&[target]);
        let append = {
            let projection = self.projection.read();
            projection.plan_cut(&line, sequence_number, point, expected_version)?
        };
        TopologyStore::single(self.commit(vec![append])?, target)
    }

    /// Attach the `end` of a segment at `point` to connector `junction`.
    pub fn connect(
        &self,
        line: LineId,
        sequence_number: Option<u16>,
        point: RouteNodeId,
        end: EndKind,
        junction: JunctionId,
        expected_version: Option<u64>,
    ) -> Result<AppliedVersion, TopologyError> {
        let target = self
            .projection
            .read()
            .connect_line(&line, sequence_number)?
            .id;
        let _guards = self.lock_lines(&[target]);
        let append = {
            let projection = self.projection.read();
            projection.plan_connect(
                &line,
                sequence_number,
                point,
                end,
                junction,
                expected_version,
            )?
        };
        TopologyStore::single(self.commit(vec![append])?, target)
    }

    pub fn execute(&self, command: Command) -> Result<Vec<AppliedVersion>, TopologyError> {
        tracing::info!("[TopologyStore::execute] {command}");
        let result = match command {
            Command::CreateLine {
                id,
                walk,
                kind,
                parent,
                sequence_number,
                name,
            } => self
                .place_line(id, walk, kind, parent, sequence_number, &name)
                .map(|v| vec![v]),
            Command::CreateMultiConduit {
                id,
                walk,
                inner_conduit_count,
                name,
            } => self.place_multi_conduit(
                id,
                walk,
                inner_conduit_count.unwrap_or(self.config.default_inner_conduit_count),
                &name,
            ),
            Command::CutLine {
                line,
                sequence_number,
                point,
                expected_version,
            } => self
                .cut(line, sequence_number, point, expected_version)
                .map(|v| vec![v]),
            Command::ConnectLine {
                line,
                sequence_number,
                point,
                end,
                junction,
                expected_version,
            } => self
                .connect(line, sequence_number, point, end, junction, expected_version)
                .map(|v| vec![v]),
        };
        if let Err(e) = &result {
            tracing::debug!("[TopologyStore::execute] rejected: {e}");
        }
        result
    }

    pub fn query(&self, query: Query) -> Result<QueryResult, TopologyError> {
        tracing::debug!("[TopologyStore::query] {query}");
        Ok(match query {
            Query::GetLine { id } => QueryResult::Line(self.get_line(&id)?),
            Query::GetSegment { id } => QueryResult::Segment(self.get_segment(&id)?),
            Query::GetJunction { id, scope } => {
                QueryResult::Junction(self.get_junction(&id, scope)?)
            }
            Query::GetRelationsAt { point, filter } => {
                QueryResult::Relations(self.relations_at(&point, filter)?)
            }
            Query::GetRelationsOnRouteSegment {
                route_segment,
                filter,
            } => QueryResult::Relations(self.relations_on_route_segment(&route_segment, filter)?),
            Query::Traverse { start } => QueryResult::Nodes(self.traverse(&start)?),
            Query::IsCutAt { line, point } => QueryResult::Flag(self.is_cut_at(&line, &point)?),
            Query::InnerConduit {
                line,
                sequence_number,
            } => QueryResult::LineId(self.inner_conduit(&line, sequence_number)?),
        })
    }

    pub fn get_line(&self, id: &LineId) -> Result<LineInfo, TopologyError> {
        self.projection.read().line_info(id)
    }

    pub fn get_segment(&self, id: &SegmentId) -> Result<SegmentInfo, TopologyError> {
        self.projection.read().segment_info(id)
    }

    pub fn get_junction(
        &self,
        id: &JunctionId,
        scope: Option<LineId>,
    ) -> Result<Junction, TopologyError> {
        self.projection.read().junction_info(id, scope)
    }

    pub fn relations_at(
        &self,
        point: &RouteNodeId,
        filter: Option<Uuid>,
    ) -> Result<Vec<SegmentRelation>, TopologyError> {
        self.projection
            .read()
            .relations_at(point, RelationFilter(filter))
    }

    pub fn relations_on_route_segment(
        &self,
        route_segment: &RouteSegmentId,
        filter: Option<Uuid>,
    ) -> Result<Vec<SegmentRelation>, TopologyError> {
        self.projection
            .read()
            .relations_on_route_segment(route_segment, RelationFilter(filter))
    }

    pub fn traverse(&self, start: &SegmentId) -> Result<Vec<TraversalNode>, TopologyError> {
        self.projection.read().traverse(start)
    }

    pub fn is_cut_at(&self, line: &LineId, point: &RouteNodeId) -> Result<bool, TopologyError> {
        self.projection.read().is_cut_at(line, point)
    }

    pub fn inner_conduit(
        &self,
        line: &LineId,
        sequence_number: u16,
    ) -> Result<LineId, TopologyError> {
        self.projection.read().inner_conduit(line, sequence_number)
    }

    pub fn fingerprint(&self) -> Result<String, TopologyError> {
        self.projection.read().fingerprint()
    }

    /// Discard the projection and rebuild it from the event log. Returns the new fingerprint.
    pub fn reload(&self) -> Result<String, TopologyError> {
        let log = self.log.lock();
        let records = log.records()?;
        let fresh = Projection::replay(self.config.direction, &records, self.network.as_ref())?;
        let fingerprint = fresh.fingerprint()?;
        let lines = fresh.line_count();
        *self.projection.write() = fresh;
        drop(log);
        tracing::info!("[TopologyStore::reload] {lines} lines, fingerprint {fingerprint}");
        self.notify(TopologyEvent::Reloaded {
            lines,
            fingerprint: fingerprint.clone(),
        });
        Ok(fingerprint)
    }

    /// Alias of [TopologyStore::reload].
    pub fn clean(&self) -> Result<String, TopologyError> {
        self.reload()
    }
}
