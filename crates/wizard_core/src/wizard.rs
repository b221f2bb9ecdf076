use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shared::{
    acquisition::AcquisitionSourceMapping,
    domain::{
        BasicOrderInfo, BranchId, ClientSummary, ItemId, ItemSubstep, NewClient, OrderConfirmation,
        OrderParameters, SessionId, Stage, WizardStep,
    },
    protocol::{StageResult, StageSnapshot, ValidationIssue, ValidationReport},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    client_search::ClientSearch,
    debounce::DebounceConfig,
    error::WizardError,
    event_bus::{event_types, handler_fn, DomainEvent, EventBus, EventHandler, Subscription},
    navigation::{Advance, Progress, Retreat, StepDescriptor, StepNavigator, ValidationErrors},
    session::SessionCoordinator,
    workflow::{ClientDirectory, WorkflowService},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardConfig {
    pub search: DebounceConfig,
    pub acquisition: AcquisitionSourceMapping,
}

/// Local, optimistic view of what the slices have reported so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub client: Option<ClientSummary>,
    pub branch: Option<BranchId>,
    pub order_info: Option<BasicOrderInfo>,
    pub items: Vec<ItemId>,
    pub order_parameters: Option<OrderParameters>,
    pub confirmation: Option<OrderConfirmation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Moved(WizardStep),
    Blocked(ValidationErrors),
    ReadyToComplete,
    AlreadyComplete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Moved(ItemSubstep),
    Blocked(ValidationErrors),
    Committed(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCreation {
    Created(ClientSummary),
    Rejected(ValidationErrors),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardStatus {
    pub current_step: WizardStep,
    pub item_step: Option<ItemSubstep>,
    pub readiness: Readiness,
    pub reachable_steps: Vec<WizardStep>,
    pub completed_steps: Vec<WizardStep>,
    pub ready_to_complete: bool,
    pub is_complete: bool,
    pub progress: Progress,
    pub item_progress: Progress,
}

#[derive(Default)]
struct ItemDraft {
    payloads: HashMap<ItemSubstep, Value>,
}

#[derive(Deserialize)]
struct SessionAnnouncement {
    stage: Stage,
    session_id: SessionId,
}

#[derive(Deserialize)]
struct ClientAnnouncement {
    client: ClientSummary,
}

#[derive(Deserialize)]
struct BranchAnnouncement {
    branch_id: BranchId,
}

#[derive(Deserialize)]
struct OrderInfoAnnouncement {
    order_info: BasicOrderInfo,
}

#[derive(Deserialize)]
struct ItemAnnouncement {
    item_id: ItemId,
}

#[derive(Deserialize)]
struct ParametersAnnouncement {
    order_parameters: OrderParameters,
}

#[derive(Deserialize)]
struct ConfirmationAnnouncement {
    confirmation: OrderConfirmation,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn readiness_handler<P, F>(readiness: &Arc<Mutex<Readiness>>, apply: F) -> Arc<dyn EventHandler>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(&mut Readiness, P) + Send + Sync + 'static,
{
    let readiness = readiness.clone();
    let apply = Arc::new(apply);
    handler_fn(move |event| {
        let readiness = readiness.clone();
        let apply = apply.clone();
        async move {
            let payload: P = event.payload_as()?;
            apply(&mut *lock(&readiness), payload);
            Ok(())
        }
    })
}

fn report(issues: Vec<ValidationIssue>) -> ValidationReport {
    if issues.is_empty() {
        ValidationReport::ok()
    } else {
        ValidationReport::invalid(issues)
    }
}

fn payload<T: Serialize>(stage: Stage, value: &T) -> Result<Value, WizardError> {
    serde_json::to_value(value).map_err(|err| WizardError::Payload {
        stage,
        message: err.to_string(),
    })
}

fn wizard_steps(
    readiness: &Arc<Mutex<Readiness>>,
    draft: &Arc<Mutex<Option<ItemDraft>>>,
) -> Result<StepNavigator<WizardStep>, WizardError> {
    let client = {
        let readiness = readiness.clone();
        StepDescriptor::new(WizardStep::ClientSelection, move || {
            if lock(&readiness).client.is_some() {
                ValidationReport::ok()
            } else {
                ValidationReport::invalid(vec![ValidationIssue::for_field(
                    "client",
                    "select or create a client",
                )])
            }
        })
    };

    let branch = {
        let readiness = readiness.clone();
        StepDescriptor::new(WizardStep::BranchSelection, move || {
            let readiness = lock(&readiness);
            let mut issues = Vec::new();
            if readiness.branch.is_none() {
                issues.push(ValidationIssue::for_field("branch", "select a branch"));
            }
            if !readiness
                .order_info
                .as_ref()
                .is_some_and(BasicOrderInfo::is_complete)
            {
                issues.push(ValidationIssue::for_field(
                    "receipt_number",
                    "enter the receipt number",
                ));
            }
            report(issues)
        })
    };

    let items = {
        let readiness = readiness.clone();
        let draft = draft.clone();
        StepDescriptor::new(WizardStep::ItemManagement, move || {
            let mut issues = Vec::new();
            if lock(&draft).is_some() {
                issues.push(ValidationIssue::for_field(
                    "items",
                    "finish or discard the item in progress",
                ));
            }
            if lock(&readiness).items.is_empty() {
                issues.push(ValidationIssue::for_field("items", "add at least one item"));
            }
            report(issues)
        })
    };

    let parameters = {
        let readiness = readiness.clone();
        StepDescriptor::new(WizardStep::OrderParameters, move || {
            let readiness = lock(&readiness);
            match &readiness.order_parameters {
                Some(parameters) => parameters.validate(),
                None => ValidationReport::invalid(vec![ValidationIssue::for_field(
                    "order_parameters",
                    "set the order parameters",
                )]),
            }
        })
    };

    let confirmation = {
        let readiness = readiness.clone();
        StepDescriptor::new(WizardStep::OrderConfirmation, move || {
            let readiness = lock(&readiness);
            match &readiness.confirmation {
                Some(confirmation) => confirmation.validate(),
                None => ValidationReport::invalid(vec![ValidationIssue::for_field(
                    "confirmation",
                    "confirm the order with the client",
                )]),
            }
        })
    };

    Ok(StepNavigator::new(vec![
        client,
        branch,
        items,
        parameters,
        confirmation,
    ])?)
}

fn item_steps(
    draft: &Arc<Mutex<Option<ItemDraft>>>,
) -> Result<StepNavigator<ItemSubstep>, WizardError> {
    let steps = ItemSubstep::ORDER
        .into_iter()
        .map(|substep| {
            let draft = draft.clone();
            StepDescriptor::new(substep, move || {
                let submitted = lock(&draft)
                    .as_ref()
                    .is_some_and(|draft| draft.payloads.contains_key(&substep));
                if submitted {
                    ValidationReport::ok()
                } else {
                    ValidationReport::single(format!("submit {substep} details first"))
                }
            })
        })
        .collect();
    Ok(StepNavigator::new(steps)?)
}

pub struct OrderWizard {
    config: WizardConfig,
    events: EventBus,
    order: SessionCoordinator,
    client_search: ClientSearch,
    client_creation: SessionCoordinator,
    branch_selection: SessionCoordinator,
    order_info: SessionCoordinator,
    item_manager: SessionCoordinator,
    item_stages: HashMap<ItemSubstep, SessionCoordinator>,
    order_parameters: SessionCoordinator,
    order_confirmation: SessionCoordinator,
    readiness: Arc<Mutex<Readiness>>,
    draft: Arc<Mutex<Option<ItemDraft>>>,
    steps: Mutex<StepNavigator<WizardStep>>,
    item_steps: Mutex<StepNavigator<ItemSubstep>>,
    subscriptions: Vec<Subscription>,
}

impl OrderWizard {
    pub fn new<S>(service: Arc<S>, config: WizardConfig) -> Result<Self, WizardError>
    where
        S: WorkflowService + ClientDirectory + 'static,
    {
        Self::with_directory(service.clone(), service, config)
    }

    pub fn with_directory(
        service: Arc<dyn WorkflowService>,
        directory: Arc<dyn ClientDirectory>,
        config: WizardConfig,
    ) -> Result<Self, WizardError> {
        let events = EventBus::new();
        let coordinator =
            |stage| SessionCoordinator::with_event_bus(stage, service.clone(), events.clone());

        let item_stages: HashMap<_, _> = ItemSubstep::ORDER
            .into_iter()
            .map(|substep| (substep, coordinator(substep.stage())))
            .collect();
        let readiness = Arc::new(Mutex::new(Readiness::default()));
        let draft = Arc::new(Mutex::new(None));

        let mut wizard = Self {
            order: coordinator(Stage::Order),
            client_creation: coordinator(Stage::ClientCreation),
            branch_selection: coordinator(Stage::BranchSelection),
            order_info: coordinator(Stage::BasicOrderInfo),
            item_manager: coordinator(Stage::ItemManager),
            order_parameters: coordinator(Stage::OrderParameters),
            order_confirmation: coordinator(Stage::OrderConfirmation),
            client_search: ClientSearch::new(
                service.clone(),
                directory,
                events.clone(),
                config.search,
            ),
            steps: Mutex::new(wizard_steps(&readiness, &draft)?),
            item_steps: Mutex::new(item_steps(&draft)?),
            config,
            events,
            item_stages,
            readiness,
            draft,
            subscriptions: Vec::new(),
        };
        wizard.subscribe_slices();
        Ok(wizard)
    }

    fn subscribe_slices(&mut self) {
        let children: Vec<SessionCoordinator> = self.item_stages.values().cloned().collect();
        let seed_items = handler_fn(move |event| {
            let children = children.clone();
            async move {
                let announced: SessionAnnouncement = event.payload_as()?;
                if announced.stage == Stage::ItemManager {
                    for child in &children {
                        child.adopt_session(announced.session_id.clone());
                    }
                    debug!(session_id = %announced.session_id, "wizard: item sub-stages seeded");
                }
                Ok(())
            }
        });

        let readiness = &self.readiness;
        let handlers = [
            (event_types::SESSION_STARTED, seed_items),
            (
                event_types::CLIENT_SELECTED,
                readiness_handler(readiness, |state, event: ClientAnnouncement| {
                    state.client = Some(event.client)
                }),
            ),
            (
                event_types::CLIENT_CREATED,
                readiness_handler(readiness, |state, event: ClientAnnouncement| {
                    state.client = Some(event.client)
                }),
            ),
            (
                event_types::CLIENT_SELECTION_CLEARED,
                readiness_handler(readiness, |state, _: Value| state.client = None),
            ),
            (
                event_types::BRANCH_SELECTED,
                readiness_handler(readiness, |state, event: BranchAnnouncement| {
                    state.branch = Some(event.branch_id)
                }),
            ),
            (
                event_types::ORDER_INFO_UPDATED,
                readiness_handler(readiness, |state, event: OrderInfoAnnouncement| {
                    state.order_info = Some(event.order_info)
                }),
            ),
            (
                event_types::ITEM_CREATED,
                readiness_handler(readiness, |state, event: ItemAnnouncement| {
                    state.items.push(event.item_id)
                }),
            ),
            (
                event_types::ORDER_PARAMETERS_UPDATED,
                readiness_handler(readiness, |state, event: ParametersAnnouncement| {
                    state.order_parameters = Some(event.order_parameters)
                }),
            ),
            (
                event_types::ORDER_CONFIRMATION_UPDATED,
                readiness_handler(readiness, |state, event: ConfirmationAnnouncement| {
                    state.confirmation = Some(event.confirmation)
                }),
            ),
            (
                event_types::WIZARD_CANCELLED,
                readiness_handler(readiness, |state, _: Value| *state = Readiness::default()),
            ),
        ];

        for (event_type, handler) in handlers {
            let subscription = self.events.subscribe(event_type, handler);
            self.subscriptions.push(subscription);
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.events
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn readiness(&self) -> Readiness {
        lock(&self.readiness).clone()
    }

    pub async fn start(&self) -> Result<SessionId, WizardError> {
        let session_id = self.order.ensure_session().await?;
        info!(%session_id, "wizard: order session ready");
        Ok(session_id)
    }

    pub fn client_search(&self) -> &ClientSearch {
        &self.client_search
    }

    pub async fn select_client(&self, client: ClientSummary) -> Result<(), WizardError> {
        self.client_search.select(client).await
    }

    pub async fn clear_client_selection(&self) {
        self.client_search.clear_selection().await;
    }

    pub async fn create_client(&self, draft: NewClient) -> Result<ClientCreation, WizardError> {
        let local = draft.validate();
        if !local.valid {
            return Ok(ClientCreation::Rejected(ValidationErrors(local.errors)));
        }
        let source = self.config.acquisition.to_wire(draft.source)?;

        self.client_creation
            .submit_step(json!({
                "first_name": draft.first_name,
                "last_name": draft.last_name,
                "phone": draft.phone,
                "email": draft.email,
                "address": draft.address,
                "communication_channels": draft.communication_channels,
                "information_source": source,
                "source_details": draft.source_details,
            }))
            .await?;

        let remote = self.client_creation.validate().await?;
        if !remote.valid {
            return Ok(ClientCreation::Rejected(ValidationErrors(remote.errors)));
        }

        let result = self.client_creation.complete().await?;
        let client: ClientSummary =
            serde_json::from_value(result.result).map_err(|err| WizardError::Payload {
                stage: Stage::ClientCreation,
                message: err.to_string(),
            })?;

        self.client_search.remember(client.clone());
        info!(client_id = %client.client_id, "wizard: client created");
        self.events
            .publish(DomainEvent::new(
                event_types::CLIENT_CREATED,
                client.client_id.as_str(),
                json!({ "client": client }),
            ))
            .await;
        Ok(ClientCreation::Created(client))
    }

    pub async fn select_branch(&self, branch_id: BranchId) -> Result<(), WizardError> {
        self.branch_selection
            .submit_step(json!({ "branch_id": branch_id }))
            .await?;
        self.events
            .publish(DomainEvent::new(
                event_types::BRANCH_SELECTED,
                branch_id.as_str(),
                json!({ "branch_id": branch_id }),
            ))
            .await;
        Ok(())
    }

    pub async fn update_order_info(&self, order_info: BasicOrderInfo) -> Result<(), WizardError> {
        let snapshot = self
            .order_info
            .submit_step(payload(Stage::BasicOrderInfo, &order_info)?)
            .await?;
        self.events
            .publish(DomainEvent::new(
                event_types::ORDER_INFO_UPDATED,
                snapshot.session_id.as_str(),
                json!({ "order_info": order_info }),
            ))
            .await;
        Ok(())
    }

    fn require_step(&self, operation: &'static str, step: WizardStep) -> Result<(), WizardError> {
        let current = lock(&self.steps).current();
        if current != step {
            return Err(WizardError::StepUnavailable { operation, current });
        }
        Ok(())
    }

    fn current_item_step(&self) -> Result<ItemSubstep, WizardError> {
        if lock(&self.draft).is_none() {
            return Err(WizardError::NoItemInProgress);
        }
        Ok(lock(&self.item_steps).current())
    }

    fn item_stage(&self, substep: ItemSubstep) -> Result<&SessionCoordinator, WizardError> {
        self.item_stages.get(&substep).ok_or_else(|| WizardError::Payload {
            stage: substep.stage(),
            message: "no coordinator for item sub-stage".to_string(),
        })
    }

    /// Starts characterizing a new item. Returns the first sub-step, or the
    /// current one when an item is already in progress.
    pub async fn begin_item(&self) -> Result<ItemSubstep, WizardError> {
        self.require_step("begin_item", WizardStep::ItemManagement)?;
        if let Ok(current) = self.current_item_step() {
            return Ok(current);
        }

        let session_id = self.item_manager.ensure_session().await?;
        for child in self.item_stages.values() {
            if child.session_id().as_ref() != Some(&session_id) {
                child.adopt_session(session_id.clone());
            }
        }

        lock(&self.item_steps).reset();
        *lock(&self.draft) = Some(ItemDraft::default());
        info!(%session_id, "wizard: item started");
        Ok(ItemSubstep::BasicInfo)
    }

    pub async fn submit_item_step(&self, payload: Value) -> Result<StageSnapshot, WizardError> {
        let substep = self.current_item_step()?;
        let snapshot = self
            .item_stage(substep)?
            .submit_step(payload.clone())
            .await?;

        match lock(&self.draft).as_mut() {
            Some(draft) => {
                draft.payloads.insert(substep, payload);
            }
            None => return Err(WizardError::NoItemInProgress),
        }
        Ok(snapshot)
    }

    pub async fn advance_item(&self) -> Result<ItemOutcome, WizardError> {
        let substep = self.current_item_step()?;
        let remote = self.item_stage(substep)?.validate().await?;
        if !remote.valid {
            return Ok(ItemOutcome::Blocked(ValidationErrors(remote.errors)));
        }

        let advanced = lock(&self.item_steps).advance();
        match advanced {
            Ok(Advance::Moved(next)) => Ok(ItemOutcome::Moved(next)),
            Ok(Advance::ReadyToComplete) => self.commit_item().await.map(ItemOutcome::Committed),
            Ok(Advance::AlreadyComplete) => Err(WizardError::NoItemInProgress),
            Err(errors) => Ok(ItemOutcome::Blocked(errors)),
        }
    }

    async fn commit_item(&self) -> Result<ItemId, WizardError> {
        let item = {
            let draft = lock(&self.draft);
            let draft = draft.as_ref().ok_or(WizardError::NoItemInProgress)?;
            let mut substeps = Map::new();
            for substep in ItemSubstep::ORDER {
                if let Some(payload) = draft.payloads.get(&substep) {
                    substeps.insert(substep.to_string(), payload.clone());
                }
            }
            Value::Object(substeps)
        };

        let snapshot = self
            .item_manager
            .submit_step(json!({ "item": item }))
            .await?;
        let item_id = snapshot
            .state
            .get("item_id")
            .and_then(Value::as_str)
            .map(ItemId::new)
            .unwrap_or_else(|| ItemId::new(Uuid::new_v4().to_string()));

        lock(&self.item_steps).acknowledge_completion()?;
        *lock(&self.draft) = None;

        info!(%item_id, "wizard: item committed");
        self.events
            .publish(DomainEvent::new(
                event_types::ITEM_CREATED,
                item_id.as_str(),
                json!({ "item_id": item_id, "item": item }),
            ))
            .await;
        Ok(item_id)
    }

    pub fn retreat_item(&self) -> Result<Retreat<ItemSubstep>, WizardError> {
        self.current_item_step()?;
        Ok(lock(&self.item_steps).retreat())
    }

    pub fn discard_item(&self) {
        if lock(&self.draft).take().is_some() {
            lock(&self.item_steps).reset();
            debug!("wizard: item discarded");
        }
    }

    pub async fn update_order_parameters(
        &self,
        order_parameters: OrderParameters,
    ) -> Result<(), WizardError> {
        self.require_step("update_order_parameters", WizardStep::OrderParameters)?;
        let snapshot = self
            .order_parameters
            .submit_step(payload(Stage::OrderParameters, &order_parameters)?)
            .await?;
        self.events
            .publish(DomainEvent::new(
                event_types::ORDER_PARAMETERS_UPDATED,
                snapshot.session_id.as_str(),
                json!({ "order_parameters": order_parameters }),
            ))
            .await;
        Ok(())
    }

    pub async fn confirm_order(&self, confirmation: OrderConfirmation) -> Result<(), WizardError> {
        self.require_step("confirm_order", WizardStep::OrderConfirmation)?;
        let snapshot = self
            .order_confirmation
            .submit_step(payload(Stage::OrderConfirmation, &confirmation)?)
            .await?;
        self.events
            .publish(DomainEvent::new(
                event_types::ORDER_CONFIRMATION_UPDATED,
                snapshot.session_id.as_str(),
                json!({ "confirmation": confirmation }),
            ))
            .await;
        Ok(())
    }

    pub fn advance(&self) -> StepOutcome {
        match lock(&self.steps).advance() {
            Ok(Advance::Moved(step)) => StepOutcome::Moved(step),
            Ok(Advance::ReadyToComplete) => StepOutcome::ReadyToComplete,
            Ok(Advance::AlreadyComplete) => StepOutcome::AlreadyComplete,
            Err(errors) => StepOutcome::Blocked(errors),
        }
    }

    pub fn retreat(&self) -> Retreat<WizardStep> {
        lock(&self.steps).retreat()
    }

    pub fn jump_to(&self, step: WizardStep) -> Result<WizardStep, WizardError> {
        Ok(lock(&self.steps).jump_to(step)?)
    }

    pub async fn complete_order(&self) -> Result<StageResult, WizardError> {
        {
            let steps = lock(&self.steps);
            if !steps.is_ready_to_complete() {
                return Err(WizardError::NotReady(steps.current().to_string()));
            }
            if let Some((step, errors)) = steps.first_invalid() {
                warn!(%step, "wizard: completion blocked by a stale step");
                return Err(WizardError::Incomplete { step, errors });
            }
        }

        let readiness = self.readiness();
        let (Some(client), Some(branch_id), Some(order_info), Some(parameters), Some(confirmation)) = (
            readiness.client,
            readiness.branch,
            readiness.order_info,
            readiness.order_parameters,
            readiness.confirmation,
        ) else {
            return Err(WizardError::NotReady(WizardStep::OrderConfirmation.to_string()));
        };

        self.order
            .submit_step(json!({
                "client_id": client.client_id,
                "branch_id": branch_id,
                "order_info": order_info,
                "item_ids": readiness.items,
                "order_parameters": parameters,
                "confirmation": confirmation,
            }))
            .await?;
        let result = self.order.complete().await?;
        lock(&self.steps).acknowledge_completion()?;

        self.client_search.sessions().release();
        for coordinator in self.stage_coordinators() {
            coordinator.release();
        }
        info!(session_id = %result.session_id, "wizard: order completed");
        self.events
            .publish(DomainEvent::new(
                event_types::WIZARD_COMPLETED,
                result.session_id.as_str(),
                json!({ "result": result.result }),
            ))
            .await;
        Ok(result)
    }

    fn stage_coordinators(&self) -> impl Iterator<Item = &SessionCoordinator> {
        self.item_stages.values().chain([
            &self.item_manager,
            &self.client_creation,
            &self.branch_selection,
            &self.order_info,
            &self.order_parameters,
            &self.order_confirmation,
        ])
    }

    pub async fn cancel(&self) {
        let order_session = self.order.session_id();
        self.client_search.reset().await;
        for coordinator in self.stage_coordinators() {
            coordinator.reset().await;
        }
        self.order.reset().await;

        *lock(&self.draft) = None;
        lock(&self.item_steps).reset();
        lock(&self.steps).reset();

        let aggregate_id = order_session
            .as_ref()
            .map_or("unstarted", SessionId::as_str);
        let outcome = self
            .events
            .publish(DomainEvent::new(
                event_types::WIZARD_CANCELLED,
                aggregate_id,
                json!({ "order_session_id": order_session }),
            ))
            .await;
        if outcome.failed > 0 {
            warn!(failed = outcome.failed, "wizard: cancel listeners failed");
        }
        info!("wizard: cancelled");
    }

    pub fn progress(&self) -> Progress {
        lock(&self.steps).progress()
    }

    pub fn item_progress(&self) -> Progress {
        lock(&self.item_steps).progress()
    }

    pub fn status(&self) -> WizardStatus {
        let (current_step, reachable_steps, completed_steps, ready_to_complete, is_complete, progress) = {
            let steps = lock(&self.steps);
            (
                steps.current(),
                steps.steps().filter(|step| steps.is_reachable(*step)).collect::<Vec<_>>(),
                steps.steps().filter(|step| steps.is_step_completed(*step)).collect::<Vec<_>>(),
                steps.is_ready_to_complete(),
                steps.is_complete(),
                steps.progress(),
            )
        };
        let item_step = self.current_item_step().ok();
        WizardStatus {
            current_step,
            item_step,
            readiness: self.readiness(),
            reachable_steps,
            completed_steps,
            ready_to_complete,
            is_complete,
            progress,
            item_progress: self.item_progress(),
        }
    }
}

impl Drop for OrderWizard {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
