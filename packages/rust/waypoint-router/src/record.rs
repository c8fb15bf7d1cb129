use crate::config::{Meta, PropsRule, Redirect, View};
use crate::guard::NavigationGuard;
use crate::params::{Params, RouteRegex};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Stable index of a record in its route map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) usize);

/// A mounted component instance, owned by the renderer.
pub type ViewInstance = Arc<dyn Any + Send + Sync>;

/// Callback queued by an enter guard; receives the instance once it mounts.
pub type EnteredCallback = Box<dyn FnOnce(&ViewInstance) + Send>;

/// The compiled form of one configured route.
///
/// Records are immutable after creation apart from the live instances and
/// the pending "entered" callbacks, which the renderer and the navigation
/// pipeline update through [`RouteRecord::register_instance`] and the enter
/// guards respectively.
pub struct RouteRecord {
    pub(crate) id: RecordId,
    pub(crate) path: String,
    pub(crate) regex: Option<RouteRegex>,
    pub(crate) components: IndexMap<String, View>,
    pub(crate) alias: Vec<String>,
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<RecordId>,
    pub(crate) match_as: Option<String>,
    pub(crate) redirect: Option<Redirect>,
    pub(crate) before_enter: Option<NavigationGuard>,
    pub(crate) meta: Meta,
    pub(crate) props: IndexMap<String, PropsRule>,
    instances: Mutex<HashMap<String, ViewInstance>>,
    entered_cbs: Mutex<HashMap<String, Vec<EnteredCallback>>>,
}

impl RouteRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: RecordId,
        path: String,
        regex: Option<RouteRegex>,
        components: IndexMap<String, View>,
        alias: Vec<String>,
        name: Option<String>,
        parent: Option<RecordId>,
        match_as: Option<String>,
        redirect: Option<Redirect>,
        before_enter: Option<NavigationGuard>,
        meta: Meta,
        props: IndexMap<String, PropsRule>,
    ) -> Self {
        Self {
            id,
            path,
            regex,
            components,
            alias,
            name,
            parent,
            match_as,
            redirect,
            before_enter,
            meta,
            props,
            instances: Mutex::new(HashMap::new()),
            entered_cbs: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Normalized absolute path template.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.parent
    }

    pub fn alias(&self) -> &[String] {
        &self.alias
    }

    /// The concrete path an alias record resolves through.
    pub fn match_as(&self) -> Option<&str> {
        self.match_as.as_deref()
    }

    pub fn is_alias(&self) -> bool {
        self.match_as.is_some()
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        self.redirect.as_ref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn components(&self) -> &IndexMap<String, View> {
        &self.components
    }

    pub fn props(&self, slot: &str) -> Option<&PropsRule> {
        self.props.get(slot)
    }

    pub fn regex(&self) -> Option<&RouteRegex> {
        self.regex.as_ref()
    }

    pub(crate) fn before_enter(&self) -> Option<&NavigationGuard> {
        self.before_enter.as_ref()
    }

    pub(crate) fn captures(&self, path: &str) -> Option<Params> {
        self.regex.as_ref()?.captures(path)
    }

    /// The live instance mounted in `slot`.
    pub fn instance(&self, slot: &str) -> Option<ViewInstance> {
        self.instances.lock().get(slot).cloned()
    }

    /// Registers (`Some`) or unregisters (`None`) the instance mounted in `slot`.
    ///
    /// Registering delivers any callbacks an enter guard queued for the slot.
    pub fn register_instance(&self, slot: &str, instance: Option<ViewInstance>) {
        match instance {
            Some(instance) => {
                self.instances.lock().insert(slot.to_string(), instance);
                self.deliver_entered();
            }
            None => {
                self.instances.lock().remove(slot);
            }
        }
    }

    pub(crate) fn queue_entered(&self, slot: &str, callback: EnteredCallback) {
        self.entered_cbs
            .lock()
            .entry(slot.to_string())
            .or_default()
            .push(callback);
    }

    /// Runs queued entered callbacks for every slot that has an instance.
    pub(crate) fn deliver_entered(&self) {
        let ready: Vec<(ViewInstance, Vec<EnteredCallback>)> = {
            let instances = self.instances.lock();
            let mut entered = self.entered_cbs.lock();
            instances
                .iter()
                .filter_map(|(slot, instance)| {
                    entered
                        .remove(slot)
                        .map(|callbacks| (Arc::clone(instance), callbacks))
                })
                .collect()
        };

        for (instance, callbacks) in ready {
            for callback in callbacks {
                callback(&instance);
            }
        }
    }
}

impl PartialEq for RouteRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for RouteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRecord")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("match_as", &self.match_as)
            .field("alias", &self.alias)
            .field("redirect", &self.redirect)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}
