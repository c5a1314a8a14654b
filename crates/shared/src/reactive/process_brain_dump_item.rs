use serde_json::{Value, json};
use uuid::Uuid;

use crate::commands::CommandError;
use crate::domain::task::{Task, TaskCategory, TaskFrequency};
use crate::event_dispatch::EventDispatcher;
use crate::llm::{
    AssistantCapability, ClassifyBrainDumpArgs, LlmExecutionSource, LlmGateway, LlmUseCase,
    PromptTemplate, ToolError, ToolInvokeFuture, ToolSpec, run_use_case, template_for_capability,
};
use crate::pubsub::PubSubBus;
use crate::repos::Store;
use crate::uow::UnitOfWork;

const ADHOC_TASK_TYPE: &str = "ADHOC";

struct BrainDumpClassificationUseCase;

impl LlmUseCase for BrainDumpClassificationUseCase {
    fn prompt_template(&self) -> PromptTemplate {
        template_for_capability(AssistantCapability::BrainDumpClassification)
    }

    fn tools(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new::<ClassifyBrainDumpArgs>(
            "classify_brain_dump",
            "Classify a brain-dump note into a concrete task or a discard.",
        )]
    }

    fn invoke_tool<'a>(&'a self, name: &str, arguments: Value) -> ToolInvokeFuture<'a> {
        let name = name.to_string();
        Box::pin(async move {
            if name != "classify_brain_dump" {
                return Err(ToolError::Failed(format!("unknown tool {name}")));
            }
            let args: ClassifyBrainDumpArgs =
                serde_json::from_value(arguments).map_err(|err| ToolError::Failed(err.to_string()))?;
            serde_json::to_value(&args).map_err(|err| ToolError::Failed(err.to_string()))
        })
    }
}

/// `PROCESS_BRAIN_DUMP_ITEM` job body (SPEC_FULL.md's brain-dump
/// supplement): classifies one pending `BrainDumpItem` into either a new
/// adhoc Task or a discard, via a single-tool LLM use case.
pub async fn process_brain_dump_item(
    store: Store,
    dispatcher: &EventDispatcher,
    pubsub: &PubSubBus,
    user_id: Uuid,
    item_id: Uuid,
    gateway: &dyn LlmGateway,
) -> Result<Option<Uuid>, CommandError> {
    let Some(mut item) = store.find_brain_dump_item(item_id).await? else {
        return Ok(None);
    };
    if item.user_id != user_id {
        return Ok(None);
    }

    let context_payload = json!({
        "raw_text": item.raw_text,
        "day_date": item.day_date,
    });

    let use_case = BrainDumpClassificationUseCase;
    let snapshot = run_use_case(
        gateway,
        LlmExecutionSource::WorkerProcessBrainDumpItem,
        &use_case,
        context_payload,
        vec![item.id],
        Some(&user_id.to_string()),
    )
    .await
    .map_err(|err| CommandError::Gateway(err.to_string()))?;

    let decision = snapshot.tool_calls.first().map(|call| call.result.clone());
    let action = decision
        .as_ref()
        .and_then(|decision| decision.get("action"))
        .and_then(Value::as_str)
        .unwrap_or("discard")
        .to_string();

    let mut uow = UnitOfWork::begin(store, dispatcher, pubsub, user_id).await?;

    if action == "create_task" {
        let task_name = decision
            .as_ref()
            .and_then(|decision| decision.get("task_name"))
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(item.raw_text.as_str())
            .to_string();

        let mut task = Task::create(
            Uuid::new_v4(),
            user_id,
            item.day_date,
            task_name,
            TaskCategory::Other(ADHOC_TASK_TYPE.to_string()),
            ADHOC_TASK_TYPE.to_string(),
            TaskFrequency::Other("ONCE".to_string()),
            None,
            None,
            Vec::new(),
        );
        let task_id = task.id;

        item.mark_processed(task_id, snapshot);
        uow.add(&mut task);
        uow.add(&mut item);
        uow.commit().await?;
        Ok(Some(task_id))
    } else {
        item.mark_discarded(snapshot);
        uow.add(&mut item);
        uow.commit().await?;
        Ok(None)
    }
}
