//! 行程规划流水线
//!
//! 三个阶段按固定顺序执行：Researcher -> Budget -> Planner。每个阶段拿到当前完整状态，
//! 返回部分更新，由流水线合并。阶段失败不中断后续阶段（尽力而为：宁可给出降级行程，
//! 也不整体报错）；全部合并后无条件返回最终状态。

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::state::{PipelineState, StageUpdate, TripRequest};

/// 流水线阶段 trait：读当前状态，产出部分更新
#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, state: &PipelineState) -> StageUpdate;
}

/// 阶段进度事件，供 SSE 边界层转发
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        agent: String,
    },
    StageCompleted {
        agent: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// 流水线：按注册顺序依次执行阶段并合并结果
pub struct TripPipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl TripPipeline {
    pub fn new(stages: Vec<Box<dyn PipelineStage>>) -> Self {
        Self { stages }
    }

    /// 执行完整流水线；request 需已通过校验
    ///
    /// event_tx 为可选的进度推送通道（SSE 用），发送失败直接忽略。
    pub async fn execute(
        &self,
        request: TripRequest,
        event_tx: Option<&mpsc::UnboundedSender<PipelineEvent>>,
    ) -> PipelineState {
        tracing::info!(destination = %request.destination, "starting trip pipeline");
        let mut state = PipelineState::new(request);

        for stage in &self.stages {
            send_event(
                event_tx,
                PipelineEvent::StageStarted {
                    agent: stage.name().to_string(),
                },
            );
            tracing::info!(stage = stage.name(), "executing pipeline stage");

            let update = stage.execute(&state).await;
            if let Some(err) = &update.error {
                tracing::warn!(stage = stage.name(), error = %err, "stage completed with error");
            }
            send_event(
                event_tx,
                PipelineEvent::StageCompleted {
                    agent: stage.name().to_string(),
                    error: update.error.clone(),
                },
            );
            state.merge(update);
        }

        tracing::info!(
            has_itinerary = state.itinerary.is_some(),
            "trip pipeline finished"
        );
        state
    }
}

fn send_event(tx: Option<&mpsc::UnboundedSender<PipelineEvent>>, ev: PipelineEvent) {
    if let Some(t) = tx {
        let _ = t.send(ev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::TravelStyle;
    use crate::llm::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct RecordingStage {
        name: &'static str,
        order: Arc<AtomicUsize>,
        seen_at: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl PipelineStage for RecordingStage {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, _state: &PipelineState) -> StageUpdate {
            self.seen_at
                .store(self.order.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            StageUpdate {
                messages: vec![Message::assistant(self.name)],
                next_agent: Some(self.name.to_string()),
                error: self.fail.then(|| format!("{} failed", self.name)),
                ..Default::default()
            }
        }
    }

    fn request() -> TripRequest {
        TripRequest {
            destination: "Paris".to_string(),
            num_days: 3,
            budget_usd: 1000.0,
            travel_style: TravelStyle::Budget,
            interests: vec!["food".to_string()],
        }
    }

    #[tokio::test]
    async fn stages_run_in_order_even_after_failure() {
        let order = Arc::new(AtomicUsize::new(0));
        let positions: Vec<Arc<AtomicUsize>> =
            (0..3).map(|_| Arc::new(AtomicUsize::new(usize::MAX))).collect();
        let pipeline = TripPipeline::new(vec![
            Box::new(RecordingStage {
                name: "researcher",
                order: order.clone(),
                seen_at: positions[0].clone(),
                fail: true,
            }),
            Box::new(RecordingStage {
                name: "budget",
                order: order.clone(),
                seen_at: positions[1].clone(),
                fail: false,
            }),
            Box::new(RecordingStage {
                name: "planner",
                order: order.clone(),
                seen_at: positions[2].clone(),
                fail: false,
            }),
        ]);

        let state = pipeline.execute(request(), None).await;

        for (i, pos) in positions.iter().enumerate() {
            assert_eq!(pos.load(Ordering::SeqCst), i);
        }
        assert_eq!(state.messages.len(), 3);
        assert_eq!(state.next_agent, "planner");
        // researcher 的错误被保留（后续阶段未覆盖）
        assert_eq!(state.error.as_deref(), Some("researcher failed"));
    }

    #[tokio::test]
    async fn events_are_emitted_per_stage() {
        let order = Arc::new(AtomicUsize::new(0));
        let pipeline = TripPipeline::new(vec![Box::new(RecordingStage {
            name: "researcher",
            order: order.clone(),
            seen_at: Arc::new(AtomicUsize::new(0)),
            fail: false,
        })]);

        let (tx, mut rx) = mpsc::unbounded_channel();
        pipeline.execute(request(), Some(&tx)).await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PipelineEvent::StageStarted { agent } if agent == "researcher"));
        assert!(
            matches!(&events[1], PipelineEvent::StageCompleted { agent, error } if agent == "researcher" && error.is_none())
        );
    }
}
