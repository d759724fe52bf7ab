use async_trait::async_trait;
use ragcore::{Envelope, NodeContext, NodeError, NodeExecutor, RouterConfig};

/// Deterministic keyword-based intent classification.
///
/// The decision is advisory only: the engine never branches on `route`;
/// downstream nodes always run next in position order.
pub struct RouterExecutor;

struct Decision {
    intent: &'static str,
    category: &'static str,
    route: &'static str,
    confidence: f64,
    reasoning: String,
}

fn classify(message: &str, cfg: &RouterConfig) -> Decision {
    let lowered = message.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if let Some(hit) = cfg
        .question_keywords
        .iter()
        .find(|k| words.contains(&k.as_str()))
    {
        return Decision {
            intent: "question",
            category: "informational",
            route: "retrieval",
            confidence: 0.9,
            reasoning: format!("matched question keyword '{hit}'"),
        };
    }
    if lowered.contains('?') {
        return Decision {
            intent: "question",
            category: "informational",
            route: "retrieval",
            confidence: 0.8,
            reasoning: "message ends in a question mark".to_string(),
        };
    }
    if let Some(hit) = cfg
        .generation_keywords
        .iter()
        .find(|k| words.contains(&k.as_str()))
    {
        return Decision {
            intent: "generation-request",
            category: "creative",
            route: "generation",
            confidence: 0.8,
            reasoning: format!("matched generation keyword '{hit}'"),
        };
    }
    Decision {
        intent: "conversation",
        category: "general",
        route: "direct",
        confidence: 0.5,
        reasoning: "no routing keyword matched".to_string(),
    }
}

#[async_trait]
impl NodeExecutor for RouterExecutor {
    fn node_type(&self) -> &str {
        "router"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<Envelope, NodeError> {
        let cfg = ctx.config.as_router()?;
        let message = ctx.require_message()?;

        let decision = classify(message, cfg);
        ctx.events.info(format!(
            "classified intent '{}' (route '{}')",
            decision.intent, decision.route
        ));

        let mut next = ctx.envelope.clone();
        next.insert("intent", decision.intent);
        next.insert("category", decision.category);
        next.insert("route", decision.route);
        next.insert("confidence", decision.confidence);
        next.insert("reasoning", decision.reasoning);
        Ok(next)
    }
}
