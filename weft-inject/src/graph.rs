//! The object graph: provide, populate, init/close, lookup.

use crate::error::InjectError;
use crate::topo::{toposort, Edge, Node};
use crate::wire::{Dep, Inject};
use parking_lot::Mutex;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

type AnyValue = Arc<dyn Any + Send + Sync>;
type PortCaster = Arc<dyn Fn(&AnyValue) -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// A trait-object binding registered at provide time, making the value
/// discoverable through port lookup.
struct PortBinding {
    port_id: TypeId,
    cast: PortCaster,
}

struct ObjectRecord {
    priority: i64,
    name: Option<String>,
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Inject>,
    value_any: AnyValue,
    ports: Vec<PortBinding>,
    private: bool,
    created: bool,
    complete: bool,
}

struct NewObject {
    name: Option<String>,
    priority: i64,
    private: bool,
    created: bool,
    ports: Vec<PortBinding>,
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Inject>,
    value_any: AnyValue,
}

impl NewObject {
    fn from_value<T: Inject>(value: Arc<T>) -> Self {
        Self {
            name: None,
            priority: 0,
            private: false,
            created: false,
            ports: Vec::new(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            value: value.clone() as Arc<dyn Inject>,
            value_any: value as AnyValue,
        }
    }
}

/// Builder describing one provided object.
pub struct Provide<T: Inject> {
    value: T,
    name: Option<String>,
    priority: i64,
    private: bool,
    ports: Vec<PortBinding>,
}

impl<T: Inject> Provide<T> {
    /// Registers `value` as an unnamed singleton of its type.
    pub fn value(value: T) -> Self {
        Self {
            value,
            name: None,
            priority: 0,
            private: false,
            ports: Vec::new(),
        }
    }

    /// Registers `value` under `name`.
    pub fn named(name: impl Into<String>, value: T) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::value(value)
        }
    }

    /// Init-order hint: objects with a higher priority initialize earlier
    /// when the dependency order allows.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Maximal priority: initialize first when the dependency order allows.
    pub fn with_priority_top(mut self) -> Self {
        self.priority = i64::MAX;
        self
    }

    /// Marks the object as non-shared: it is populated but never returned by
    /// singleton or port lookup.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Makes the value discoverable through the port `P`. The caster is the
    /// unsizing coercion, written `|value| value` at the call site.
    pub fn with_port<P>(mut self, cast: fn(Arc<T>) -> Arc<P>) -> Self
    where
        P: ?Sized + Any + Send + Sync,
    {
        self.ports.push(PortBinding {
            port_id: TypeId::of::<P>(),
            cast: Arc::new(move |any: &AnyValue| {
                let concrete = any
                    .clone()
                    .downcast::<T>()
                    .expect("port binding registered for a different type");
                Box::new(cast(concrete)) as Box<dyn Any + Send + Sync>
            }),
        });
        self
    }

    fn into_object(self) -> NewObject {
        let value = Arc::new(self.value);
        NewObject {
            name: self.name,
            priority: self.priority,
            private: self.private,
            created: false,
            ports: self.ports,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            value: value.clone() as Arc<dyn Inject>,
            value_any: value as AnyValue,
        }
    }
}

struct PortRequest {
    owner: usize,
    field: String,
    port_id: TypeId,
    port_name: &'static str,
    fill: Box<dyn FnOnce(Box<dyn Any + Send + Sync>) + Send>,
}

#[derive(Default)]
struct GraphInner {
    objects: Vec<ObjectRecord>,
    unnamed: Vec<usize>,
    unnamed_types: HashMap<TypeId, usize>,
    named: HashMap<String, usize>,
    edges: Vec<Edge>,
    all_nodes: Vec<Node>,
    port_requests: Vec<PortRequest>,
    sorted: Vec<usize>,
    initialized: bool,
}

impl GraphInner {
    fn node(&self, pos: usize) -> Node {
        Node::new(pos + 1, self.objects[pos].priority)
    }

    fn display(&self, pos: usize) -> String {
        let object = &self.objects[pos];
        match &object.name {
            Some(name) => format!("\"{} named {}\"", object.type_name, name),
            None => format!("\"{}\"", object.type_name),
        }
    }

    fn provide_object(&mut self, object: NewObject) -> Result<usize, InjectError> {
        if let Some(name) = &object.name {
            if self.named.contains_key(name) {
                return Err(InjectError::DuplicateName { name: name.clone() });
            }
        } else if !object.private && self.unnamed_types.contains_key(&object.type_id) {
            return Err(InjectError::DuplicateType {
                type_name: object.type_name,
            });
        }

        let pos = self.objects.len();
        self.all_nodes.push(Node::new(pos + 1, object.priority));
        self.objects.push(ObjectRecord {
            priority: object.priority,
            name: object.name,
            type_id: object.type_id,
            type_name: object.type_name,
            value: object.value,
            value_any: object.value_any,
            ports: object.ports,
            private: object.private,
            created: object.created,
            complete: false,
        });

        let record = &self.objects[pos];
        match &record.name {
            Some(name) => {
                self.named.insert(name.clone(), pos);
            }
            None => {
                self.unnamed.push(pos);
                if !record.private {
                    self.unnamed_types.insert(record.type_id, pos);
                }
            }
        }

        if record.created {
            tracing::debug!(object = %self.display(pos), "created");
        } else {
            tracing::debug!(object = %self.display(pos), "provided");
        }
        Ok(pos)
    }

    fn add_edge(&mut self, owner: usize, dep: usize, field: &str) {
        tracing::debug!(
            dependency = %self.display(dep),
            field,
            owner = %self.display(owner),
            "assigned dependency"
        );
        self.edges.push([self.node(dep), self.node(owner)]);
    }

    fn resolve_port(&mut self, request: PortRequest) -> Result<(), InjectError> {
        let mut found: Option<usize> = None;
        for &pos in &self.unnamed {
            let object = &self.objects[pos];
            if object.private {
                continue;
            }
            if object.ports.iter().any(|b| b.port_id == request.port_id) {
                if let Some(first) = found {
                    return Err(InjectError::PortAmbiguous {
                        field: request.field,
                        port: request.port_name,
                        type_name: self.objects[request.owner].type_name,
                        first: self.objects[first].type_name,
                        second: object.type_name,
                    });
                }
                found = Some(pos);
            }
        }

        let Some(pos) = found else {
            return Err(InjectError::PortNotFound {
                field: request.field,
                port: request.port_name,
                type_name: self.objects[request.owner].type_name,
            });
        };

        let object = &self.objects[pos];
        let binding = object
            .ports
            .iter()
            .find(|b| b.port_id == request.port_id)
            .expect("binding located above");
        let value = (binding.cast)(&object.value_any);
        (request.fill)(value);
        self.add_edge(request.owner, pos, &request.field);
        Ok(())
    }

    fn populate(&mut self) -> Result<(), InjectError> {
        // Wiring may provide new objects, so walk by index as the list grows.
        let mut i = 0;
        while i < self.objects.len() {
            let pending = {
                let object = &self.objects[i];
                if object.complete {
                    None
                } else {
                    Some(object.value.clone())
                }
            };
            if let Some(value) = pending {
                self.objects[i].complete = true;
                let mut resolver = Resolver {
                    inner: self,
                    owner: i,
                };
                value.wire(&mut resolver)?;
            }
            i += 1;
        }

        // Second pass: port targets, once every concrete object exists.
        let requests = std::mem::take(&mut self.port_requests);
        for request in requests {
            self.resolve_port(request)?;
        }

        let sorted = toposort(&self.edges, &self.all_nodes).map_err(|source| {
            let objects = source
                .nodes
                .iter()
                .map(|node| self.display(node.index - 1))
                .collect::<Vec<_>>()
                .join(" >> ");
            InjectError::Cycle { objects, source }
        })?;
        self.sorted = sorted.into_iter().map(|node| node.index - 1).collect();
        Ok(())
    }
}

/// Resolves one object's dependency requests during populate.
///
/// Every method takes the requesting field's name, used in diagnostics and
/// debug logging. Slots that are already wired are left untouched.
pub struct Resolver<'a> {
    inner: &'a mut GraphInner,
    owner: usize,
}

impl Resolver<'_> {
    /// Requests the unnamed singleton of `T`, creating and wiring one when
    /// none has been provided.
    pub fn singleton<T>(&mut self, field: &str, slot: &Dep<T>) -> Result<(), InjectError>
    where
        T: Inject + Default,
    {
        if slot.is_wired() {
            return Ok(());
        }
        let pos = match self.inner.unnamed_types.get(&TypeId::of::<T>()).copied() {
            Some(pos) => pos,
            None => {
                let mut object = NewObject::from_value(Arc::new(T::default()));
                object.created = true;
                self.inner.provide_object(object)?
            }
        };
        let value = self.inner.objects[pos]
            .value_any
            .clone()
            .downcast::<T>()
            .expect("unnamed type index out of sync");
        slot.fill(value);
        self.inner.add_edge(self.owner, pos, field);
        Ok(())
    }

    /// Requests a fresh, non-shared instance of `T` used only by this owner.
    pub fn private<T>(&mut self, field: &str, slot: &Dep<T>) -> Result<(), InjectError>
    where
        T: Inject + Default,
    {
        if slot.is_wired() {
            return Ok(());
        }
        let value = Arc::new(T::default());
        let mut object = NewObject::from_value(value.clone());
        object.created = true;
        object.private = true;
        let pos = self.inner.provide_object(object)?;
        slot.fill(value);
        self.inner.add_edge(self.owner, pos, field);
        Ok(())
    }

    /// Requests the instance provided under `name`. Fails when the name is
    /// unknown or its value is not a `T`.
    pub fn named<T>(&mut self, field: &str, name: &str, slot: &Dep<T>) -> Result<(), InjectError>
    where
        T: Any + Send + Sync,
    {
        if slot.is_wired() {
            return Ok(());
        }
        let owner_type = self.inner.objects[self.owner].type_name;
        let Some(&pos) = self.inner.named.get(name) else {
            return Err(InjectError::MissingNamed {
                name: name.to_string(),
                field: field.to_string(),
                type_name: owner_type,
            });
        };
        let value = self.inner.objects[pos]
            .value_any
            .clone()
            .downcast::<T>()
            .map_err(|_| InjectError::NamedNotAssignable {
                name: name.to_string(),
                field: field.to_string(),
                expected: type_name::<T>(),
                type_name: owner_type,
            })?;
        slot.fill(value);
        self.inner.add_edge(self.owner, pos, field);
        Ok(())
    }

    /// Requests the unique provided object bound to the port `P`. Resolved
    /// in a second pass once all concrete objects exist.
    pub fn port<P>(&mut self, field: &str, slot: &Dep<P>) -> Result<(), InjectError>
    where
        P: ?Sized + Any + Send + Sync,
    {
        if slot.is_wired() {
            return Ok(());
        }
        let dep = slot.clone();
        self.inner.port_requests.push(PortRequest {
            owner: self.owner,
            field: field.to_string(),
            port_id: TypeId::of::<P>(),
            port_name: type_name::<P>(),
            fill: Box::new(move |boxed| {
                let value = boxed
                    .downcast::<Arc<P>>()
                    .expect("port caster produced a different port type");
                dep.fill(*value);
            }),
        });
        Ok(())
    }

    /// Wires an embedded value's own requests in place. The embedded value
    /// is never injectable on its own; its dependencies attach to the owner.
    pub fn inline(&mut self, field: &str, value: &dyn Inject) -> Result<(), InjectError> {
        tracing::debug!(
            field,
            owner = %self.inner.display(self.owner),
            "wiring inline struct"
        );
        value.wire(self)
    }

    /// Fills the slot with a fresh empty map private to this owner.
    pub fn private_map<K, V>(
        &mut self,
        _field: &str,
        slot: &Dep<Mutex<HashMap<K, V>>>,
    ) -> Result<(), InjectError>
    where
        K: Eq + Hash + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        if !slot.is_wired() {
            slot.fill(Arc::new(Mutex::new(HashMap::new())));
        }
        Ok(())
    }
}

/// The object graph.
///
/// Build phase accepts providers; [`Graph::init`] populates, validates the
/// dependency DAG, and runs init callbacks in topologically-sorted,
/// priority-biased order, exactly once. [`Graph::close`] walks the same
/// order in reverse. Lookups are read-safe after init.
pub struct Graph {
    inner: Mutex<GraphInner>,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GraphInner::default()),
        }
    }

    /// Registers an object described by the [`Provide`] builder.
    pub fn provide<T: Inject>(&self, provide: Provide<T>) -> Result<(), InjectError> {
        let mut inner = self.inner.lock();
        if inner.initialized {
            return Err(InjectError::ProvideAfterInit);
        }
        inner.provide_object(provide.into_object())?;
        Ok(())
    }

    /// Registers `value` as an unnamed singleton.
    pub fn provide_value<T: Inject>(&self, value: T) -> Result<(), InjectError> {
        self.provide(Provide::value(value))
    }

    /// Registers `value` under `name`.
    pub fn provide_named<T: Inject>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> Result<(), InjectError> {
        self.provide(Provide::named(name, value))
    }

    /// Populates the graph and runs init callbacks in dependency order.
    /// Subsequent calls are no-ops.
    pub fn init(&self) -> Result<(), InjectError> {
        let mut inner = self.inner.lock();
        if inner.initialized {
            return Ok(());
        }
        inner.populate()?;
        inner.initialized = true;
        let objects: Vec<(Arc<dyn Inject>, String)> = inner
            .sorted
            .iter()
            .map(|&pos| (inner.objects[pos].value.clone(), inner.display(pos)))
            .collect();
        // Callbacks run without the lock so they may look objects up.
        drop(inner);
        for (object, label) in objects {
            tracing::debug!(object = %label, "init object");
            object.init();
        }
        Ok(())
    }

    /// Runs close callbacks in reverse init order. A no-op before init.
    pub fn close(&self) {
        let inner = self.inner.lock();
        if !inner.initialized {
            return;
        }
        let objects: Vec<(Arc<dyn Inject>, String)> = inner
            .sorted
            .iter()
            .rev()
            .map(|&pos| (inner.objects[pos].value.clone(), inner.display(pos)))
            .collect();
        drop(inner);
        for (object, label) in objects {
            tracing::debug!(object = %label, "close object");
            object.close();
        }
    }

    /// Returns the unnamed singleton of type `T`.
    ///
    /// # Panics
    ///
    /// Panics when no unnamed instance of `T` was provided.
    pub fn obtain<T: Any + Send + Sync>(&self) -> Arc<T> {
        let inner = self.inner.lock();
        match inner.unnamed_types.get(&TypeId::of::<T>()) {
            Some(&pos) => inner.objects[pos]
                .value_any
                .clone()
                .downcast::<T>()
                .expect("unnamed type index out of sync"),
            None => panic!("no instance of type `{}` provided", type_name::<T>()),
        }
    }

    /// Returns the instance provided under `name`.
    ///
    /// # Panics
    ///
    /// Panics when the name is unknown or its value is not a `T`.
    pub fn obtain_named<T: Any + Send + Sync>(&self, name: &str) -> Arc<T> {
        let inner = self.inner.lock();
        match inner.named.get(name) {
            Some(&pos) => inner.objects[pos]
                .value_any
                .clone()
                .downcast::<T>()
                .unwrap_or_else(|_| {
                    panic!(
                        "instance named `{name}` is not of type `{}`",
                        type_name::<T>()
                    )
                }),
            None => panic!("no instance named `{name}`"),
        }
    }

    /// Returns the unique provided object bound to the port `P`.
    ///
    /// # Panics
    ///
    /// Panics when no object, or more than one object, is bound to `P`.
    pub fn obtain_port<P: ?Sized + Any + Send + Sync>(&self) -> Arc<P> {
        let inner = self.inner.lock();
        let port_id = TypeId::of::<P>();
        let mut found: Option<usize> = None;
        for &pos in &inner.unnamed {
            let object = &inner.objects[pos];
            if object.private {
                continue;
            }
            if object.ports.iter().any(|b| b.port_id == port_id) {
                if found.is_some() {
                    panic!(
                        "multiple instances implement port `{}`",
                        type_name::<P>()
                    );
                }
                found = Some(pos);
            }
        }
        let Some(pos) = found else {
            panic!("no instance implements port `{}`", type_name::<P>());
        };
        let object = &inner.objects[pos];
        let binding = object
            .ports
            .iter()
            .find(|b| b.port_id == port_id)
            .expect("binding located above");
        *(binding.cast)(&object.value_any)
            .downcast::<Arc<P>>()
            .expect("port caster produced a different port type")
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Dep;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    struct Database {
        inits: AtomicUsize,
        closes: AtomicUsize,
    }

    impl Inject for Database {
        fn init(&self) {
            self.inits.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Repository {
        db: Dep<Database>,
    }

    impl Inject for Repository {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.singleton("db", &self.db)
        }
    }

    #[derive(Default)]
    struct Service {
        repo: Dep<Repository>,
        db: Dep<Database>,
    }

    impl Inject for Service {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.singleton("repo", &self.repo)?;
            r.singleton("db", &self.db)
        }
    }

    #[test]
    fn test_singletons_are_shared() {
        let graph = Graph::new();
        graph.provide_value(Service::default()).unwrap();
        graph.provide_value(Repository::default()).unwrap();
        graph.init().unwrap();

        let service: Arc<Service> = graph.obtain();
        let repo: Arc<Repository> = graph.obtain();
        assert!(Arc::ptr_eq(&service.repo.get(), &repo));
        assert!(Arc::ptr_eq(&service.db.get(), &repo.db.get()));
    }

    #[test]
    fn test_missing_singletons_are_created_recursively() {
        let graph = Graph::new();
        graph.provide_value(Service::default()).unwrap();
        graph.init().unwrap();

        let service: Arc<Service> = graph.obtain();
        // Repository and Database were created on demand and fully wired.
        assert!(Arc::ptr_eq(&service.repo.get().db.get(), &service.db.get()));
    }

    #[test]
    fn test_init_order_follows_dependencies() {
        let graph = Graph::new();
        graph.provide_value(Service::default()).unwrap();
        graph.init().unwrap();

        let db: Arc<Database> = graph.obtain();
        assert_eq!(db.inits.load(Ordering::SeqCst), 1);

        // Init again is a no-op (one-shot latch).
        graph.init().unwrap();
        assert_eq!(db.inits.load(Ordering::SeqCst), 1);

        graph.close();
        assert_eq!(db.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_unnamed_provide_fails() {
        let graph = Graph::new();
        graph.provide_value(Database::default()).unwrap();
        let err = graph.provide_value(Database::default()).unwrap_err();
        assert!(matches!(err, InjectError::DuplicateType { .. }));
    }

    #[test]
    fn test_duplicate_named_provide_fails() {
        let graph = Graph::new();
        graph
            .provide_named("primary", Database::default())
            .unwrap();
        let err = graph
            .provide_named("primary", Database::default())
            .unwrap_err();
        assert!(matches!(err, InjectError::DuplicateName { .. }));
    }

    #[derive(Default)]
    struct NamedConsumer {
        db: Dep<Database>,
    }

    impl Inject for NamedConsumer {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.named("db", "primary", &self.db)
        }
    }

    #[test]
    fn test_named_lookup() {
        let graph = Graph::new();
        graph
            .provide_named("primary", Database::default())
            .unwrap();
        graph.provide_value(NamedConsumer::default()).unwrap();
        graph.init().unwrap();

        let consumer: Arc<NamedConsumer> = graph.obtain();
        let primary: Arc<Database> = graph.obtain_named("primary");
        assert!(Arc::ptr_eq(&consumer.db.get(), &primary));
    }

    #[test]
    fn test_missing_named_fails() {
        let graph = Graph::new();
        graph.provide_value(NamedConsumer::default()).unwrap();
        let err = graph.init().unwrap_err();
        assert!(matches!(err, InjectError::MissingNamed { .. }));
    }

    #[test]
    fn test_named_wrong_type_fails() {
        let graph = Graph::new();
        graph
            .provide_named("primary", Repository::default())
            .unwrap();
        graph.provide_value(NamedConsumer::default()).unwrap();
        let err = graph.init().unwrap_err();
        assert!(matches!(err, InjectError::NamedNotAssignable { .. }));
    }

    #[derive(Default)]
    struct Scratch;
    impl Inject for Scratch {}

    #[derive(Default)]
    struct WorkerA {
        scratch: Dep<Scratch>,
    }

    impl Inject for WorkerA {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.private("scratch", &self.scratch)
        }
    }

    #[derive(Default)]
    struct WorkerB {
        scratch: Dep<Scratch>,
    }

    impl Inject for WorkerB {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.private("scratch", &self.scratch)
        }
    }

    #[test]
    fn test_private_instances_are_distinct() {
        let graph = Graph::new();
        graph.provide_value(WorkerA::default()).unwrap();
        graph.provide_value(WorkerB::default()).unwrap();
        graph.init().unwrap();

        let a: Arc<WorkerA> = graph.obtain();
        let b: Arc<WorkerB> = graph.obtain();
        assert!(!Arc::ptr_eq(&a.scratch.get(), &b.scratch.get()));
    }

    trait LogPort: Send + Sync {
        fn tag(&self) -> &'static str;
    }

    #[derive(Default)]
    struct ConsoleLog;
    impl Inject for ConsoleLog {}
    impl LogPort for ConsoleLog {
        fn tag(&self) -> &'static str {
            "console"
        }
    }

    #[derive(Default)]
    struct FileLog;
    impl Inject for FileLog {}
    impl LogPort for FileLog {
        fn tag(&self) -> &'static str {
            "file"
        }
    }

    #[derive(Default)]
    struct App {
        log: Dep<dyn LogPort>,
    }

    impl Inject for App {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.port("log", &self.log)
        }
    }

    #[test]
    fn test_port_resolution() {
        let graph = Graph::new();
        graph
            .provide(Provide::value(ConsoleLog).with_port::<dyn LogPort>(|v| v))
            .unwrap();
        graph.provide_value(App::default()).unwrap();
        graph.init().unwrap();

        let app: Arc<App> = graph.obtain();
        assert_eq!(app.log.get().tag(), "console");

        let port: Arc<dyn LogPort> = graph.obtain_port();
        assert_eq!(port.tag(), "console");
    }

    #[test]
    fn test_port_none_found_fails() {
        let graph = Graph::new();
        graph.provide_value(ConsoleLog).unwrap(); // provided, but not bound
        graph.provide_value(App::default()).unwrap();
        let err = graph.init().unwrap_err();
        assert!(matches!(err, InjectError::PortNotFound { .. }));
    }

    #[test]
    fn test_port_ambiguity_fails() {
        let graph = Graph::new();
        graph
            .provide(Provide::value(ConsoleLog).with_port::<dyn LogPort>(|v| v))
            .unwrap();
        graph
            .provide(Provide::value(FileLog).with_port::<dyn LogPort>(|v| v))
            .unwrap();
        graph.provide_value(App::default()).unwrap();
        let err = graph.init().unwrap_err();
        assert!(matches!(err, InjectError::PortAmbiguous { .. }));
    }

    #[test]
    fn test_private_port_not_discoverable() {
        let graph = Graph::new();
        graph
            .provide(
                Provide::value(ConsoleLog)
                    .private()
                    .with_port::<dyn LogPort>(|v| v),
            )
            .unwrap();
        graph.provide_value(App::default()).unwrap();
        let err = graph.init().unwrap_err();
        assert!(matches!(err, InjectError::PortNotFound { .. }));
    }

    #[derive(Default)]
    struct CycleA {
        b: Dep<CycleB>,
    }

    impl Inject for CycleA {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.singleton("b", &self.b)
        }
    }

    #[derive(Default)]
    struct CycleB {
        a: Dep<CycleA>,
    }

    impl Inject for CycleB {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.singleton("a", &self.a)
        }
    }

    #[test]
    fn test_cycle_detected_naming_both_objects() {
        let graph = Graph::new();
        graph.provide_value(CycleA::default()).unwrap();
        graph.provide_value(CycleB::default()).unwrap();
        let err = graph.init().unwrap_err();
        match err {
            InjectError::Cycle { objects, .. } => {
                assert!(objects.contains("CycleA"), "missing CycleA in: {objects}");
                assert!(objects.contains("CycleB"), "missing CycleB in: {objects}");
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    struct Ordered {
        label: &'static str,
        log: Log,
    }

    impl Inject for Ordered {
        fn init(&self) {
            self.log.lock().push(format!("+{}", self.label));
        }

        fn close(&self) {
            self.log.lock().push(format!("-{}", self.label));
        }
    }

    #[test]
    fn test_priority_biases_init_order() {
        let graph = Graph::new();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        graph
            .provide_named(
                "low",
                Ordered {
                    label: "low",
                    log: log.clone(),
                },
            )
            .unwrap();
        graph
            .provide(
                Provide::named(
                    "high",
                    Ordered {
                        label: "high",
                        log: log.clone(),
                    },
                )
                .with_priority(10),
            )
            .unwrap();
        graph
            .provide(
                Provide::named(
                    "top",
                    Ordered {
                        label: "top",
                        log: log.clone(),
                    },
                )
                .with_priority_top(),
            )
            .unwrap();
        graph.init().unwrap();
        graph.close();

        let entries = log.lock().clone();
        assert_eq!(
            entries,
            vec!["+top", "+high", "+low", "-low", "-high", "-top"]
        );
    }

    #[derive(Default)]
    struct EmbeddedConfig {
        db: Dep<Database>,
    }

    impl Inject for EmbeddedConfig {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.singleton("db", &self.db)
        }
    }

    #[derive(Default)]
    struct Host {
        config: EmbeddedConfig,
    }

    impl Inject for Host {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.inline("config", &self.config)
        }
    }

    #[test]
    fn test_inline_struct_is_wired_in_place() {
        let graph = Graph::new();
        graph.provide_value(Host::default()).unwrap();
        graph.init().unwrap();

        let host: Arc<Host> = graph.obtain();
        let db: Arc<Database> = graph.obtain();
        assert!(Arc::ptr_eq(&host.config.db.get(), &db));
    }

    #[derive(Default)]
    struct Registry {
        entries: Dep<Mutex<HashMap<String, u32>>>,
    }

    impl Inject for Registry {
        fn wire(&self, r: &mut Resolver<'_>) -> Result<(), InjectError> {
            r.private_map("entries", &self.entries)
        }
    }

    #[test]
    fn test_private_map_allocated() {
        let graph = Graph::new();
        graph.provide_value(Registry::default()).unwrap();
        graph.init().unwrap();

        let registry: Arc<Registry> = graph.obtain();
        registry.entries.get().lock().insert("a".to_string(), 1);
        assert_eq!(registry.entries.get().lock().len(), 1);
    }

    #[test]
    fn test_provide_after_init_fails() {
        let graph = Graph::new();
        graph.init().unwrap();
        let err = graph.provide_value(Database::default()).unwrap_err();
        assert!(matches!(err, InjectError::ProvideAfterInit));
    }

    #[test]
    #[should_panic(expected = "no instance of type")]
    fn test_obtain_missing_panics() {
        let graph = Graph::new();
        let _: Arc<Database> = graph.obtain();
    }

    #[test]
    #[should_panic(expected = "no instance named")]
    fn test_obtain_named_missing_panics() {
        let graph = Graph::new();
        let _: Arc<Database> = graph.obtain_named("nope");
    }

    #[test]
    #[should_panic(expected = "no instance implements port")]
    fn test_obtain_port_missing_panics() {
        let graph = Graph::new();
        let _: Arc<dyn LogPort> = graph.obtain_port();
    }
}
