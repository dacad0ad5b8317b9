use std::sync::Arc;

use chatflow_advanced::{
    AdvancedScenarioConfig, AdvancedScenarioStorage, AdvancedScenarioUpdateHandler,
    InMemoryAdvancedScenarioStorage,
};
use chatflow_core::config::FlowConfig;
use chatflow_core::{ExceptionHandler, FlowError, ResponseSink, Result, Update, UpdateHandler};
use chatflow_filters::{
    AccessPermissionFilter, ConclusivePostFilter, FilterOrder, FilterRegistry, NotHandledFilter,
    PermissionAdapter, PostFilter, PreFilter, PrioritySlot, RoleFilter, ScenarioIdPersistFilter,
};
use chatflow_router::{HasRoleFilter, RoutePopulateFilter, RouteTable, RoutedUpdateHandler};
use chatflow_scenario::{ScenarioFactory, ScenarioPopulateFilter, ScenarioState, ScenarioUpdateHandler};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dispatcher::UpdateDispatcher;
use crate::exception::DefaultExceptionHandler;
use crate::pipeline::{HandleOutcome, UpdatePipeline};

/// Composition root. Only the handlers and filters enabled by
/// `[update_handler]` are built.
pub struct BotBuilder {
    config: FlowConfig,
    sink: Arc<dyn ResponseSink>,
    routes: RouteTable,
    scenario_filter: Option<Arc<dyn PreFilter>>,
    advanced: Vec<AdvancedScenarioConfig>,
    advanced_storage: Option<Arc<dyn AdvancedScenarioStorage>>,
    permission_adapter: Option<Arc<dyn PermissionAdapter>>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    filters: FilterRegistry,
}

impl BotBuilder {
    pub fn new(config: FlowConfig, sink: Arc<dyn ResponseSink>) -> Self {
        Self {
            config,
            sink,
            routes: RouteTable::new(),
            scenario_filter: None,
            advanced: Vec::new(),
            advanced_storage: None,
            permission_adapter: None,
            exception_handler: None,
            filters: FilterRegistry::new(),
        }
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn scenario<S: ScenarioState>(mut self, factory: ScenarioFactory<S>) -> Self {
        self.scenario_filter = Some(Arc::new(ScenarioPopulateFilter::new(Arc::new(factory))));
        self
    }

    pub fn advanced_scenario(mut self, config: AdvancedScenarioConfig) -> Self {
        self.advanced.push(config);
        self
    }

    pub fn advanced_storage(mut self, storage: Arc<dyn AdvancedScenarioStorage>) -> Self {
        self.advanced_storage = Some(storage);
        self
    }

    pub fn permission_adapter(mut self, adapter: Arc<dyn PermissionAdapter>) -> Self {
        self.permission_adapter = Some(adapter);
        self
    }

    /// Replace the default advice-table exception handler.
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exception_handler = Some(handler);
        self
    }

    /// User pre-filters always run after the built-in ones.
    pub fn pre_filter(mut self, order: i32, filter: Arc<dyn PreFilter>) -> Self {
        self.filters.register_pre(FilterOrder::User(order), filter);
        self
    }

    /// User post-filters always run before the built-in ones.
    pub fn post_filter(mut self, order: i32, filter: Arc<dyn PostFilter>) -> Self {
        self.filters.register_post(FilterOrder::User(order), filter);
        self
    }

    pub fn conclusive_post_filter(mut self, order: i32, filter: Arc<dyn ConclusivePostFilter>) -> Self {
        self.filters.register_conclusive(FilterOrder::User(order), filter);
        self
    }

    pub fn build(self) -> Result<Bot> {
        let config = self.config;
        config.validate()?;
        check_scenario_concurrency(&config)?;

        let toggles = &config.update_handler;
        let mut filters = self.filters;
        let mut handlers: Vec<Arc<dyn UpdateHandler>> = Vec::new();

        filters.register_pre(
            FilterOrder::Priority(PrioritySlot::Role),
            Arc::new(RoleFilter::new(self.permission_adapter, config.permission.clone())),
        );
        filters.register_pre(
            FilterOrder::Priority(PrioritySlot::AccessPermission),
            Arc::new(AccessPermissionFilter::new(config.permission.access)),
        );
        filters.register_post(
            FilterOrder::Priority(PrioritySlot::NotHandled),
            Arc::new(NotHandledFilter),
        );

        if toggles.mvc_enabled {
            filters.register_pre(
                FilterOrder::Priority(PrioritySlot::RoutePopulate),
                Arc::new(RoutePopulateFilter::new(Arc::new(self.routes))),
            );
            filters.register_pre(FilterOrder::Priority(PrioritySlot::HasRole), Arc::new(HasRoleFilter));
            handlers.push(Arc::new(RoutedUpdateHandler));
        }

        if toggles.scenario_enabled {
            match self.scenario_filter {
                Some(populate) => {
                    filters.register_pre(FilterOrder::Priority(PrioritySlot::ScenarioPopulate), populate);
                    filters.register_post(
                        FilterOrder::Priority(PrioritySlot::ScenarioIdPersist),
                        Arc::new(ScenarioIdPersistFilter),
                    );
                    handlers.push(Arc::new(ScenarioUpdateHandler));
                }
                None => info!("scenario handling enabled but no scenario configured"),
            }
        }

        if toggles.advanced_scenario_enabled && !self.advanced.is_empty() {
            let storage = self
                .advanced_storage
                .unwrap_or_else(|| Arc::new(InMemoryAdvancedScenarioStorage::new()));
            handlers.push(Arc::new(AdvancedScenarioUpdateHandler::new(storage, self.advanced)));
        }

        filters.log_summary();

        let exception_handler = self
            .exception_handler
            .unwrap_or_else(|| Arc::new(DefaultExceptionHandler::new(config.messages.clone())));

        let pipeline = Arc::new(UpdatePipeline::new(
            Arc::new(filters),
            handlers,
            exception_handler,
            self.sink,
            config.messages.clone(),
            toggles.set_default_answer,
        ));
        info!(
            bot = %config.bot.name,
            handlers = ?pipeline.handler_names(),
            max_threads_per_user = config.session.max_threads_per_user,
            "bot ready"
        );

        let dispatcher = UpdateDispatcher::new(Arc::clone(&pipeline), config.session.max_threads_per_user);
        Ok(Bot { config, pipeline, dispatcher })
    }
}

fn check_scenario_concurrency(config: &FlowConfig) -> Result<()> {
    if !config.has_unsafe_scenario_concurrency() {
        return Ok(());
    }
    let threads = config.session.max_threads_per_user;
    if config.update_handler.enabled_warning_for_scenario {
        return Err(FlowError::Config(format!(
            "max_threads_per_user = {threads} with scenarios enabled can lose scenario transitions; \
             set it to 1 or disable enabled_warning_for_scenario"
        )));
    }
    warn!(
        max_threads_per_user = threads,
        "scenario state is not locked; concurrent updates of one user may lose transitions"
    );
    Ok(())
}

/// A built bot.
pub struct Bot {
    config: FlowConfig,
    pipeline: Arc<UpdatePipeline>,
    dispatcher: UpdateDispatcher,
}

impl Bot {
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<UpdatePipeline> {
        &self.pipeline
    }

    /// Process an update on the current task.
    pub async fn handle(&self, update: Update) -> HandleOutcome {
        self.pipeline.handle(update).await
    }

    /// Process an update on a spawned task, bounded per user.
    pub async fn dispatch(&self, update: Update) -> JoinHandle<HandleOutcome> {
        self.dispatcher.dispatch(update).await
    }
}
