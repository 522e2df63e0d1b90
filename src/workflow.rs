//! Multi-agent workflows
//!
//! Two shapes are supported:
//! - sequential: each agent answers in turn and hands its output to the next
//! - concurrent: every participant answers the same prompt at once, the
//!   results are aggregated and optionally handed to a synthesis agent
//!
//! Agents are shared as `Arc<Agent>` so one built agent can take part in
//! several workflows.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::agents::{Agent, AgentResponse};
use crate::error::{Result, ToolbeltError};
use crate::llm::Usage;

/// Formats concurrent results into one text
pub type Aggregator = dyn Fn(&[StepOutput]) -> String + Send + Sync;

/// What one participant produced
#[derive(Debug)]
pub struct StepOutput {
    pub agent: String,
    pub result: Result<AgentResponse>,
}

impl StepOutput {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Answer text, or the error message for a failed step
    pub fn content(&self) -> String {
        match &self.result {
            Ok(response) => response.content.clone(),
            Err(e) => e.to_string(),
        }
    }
}

/// Outcome of a whole workflow run
#[derive(Debug)]
pub struct WorkflowOutput {
    pub workflow: String,
    /// Per-agent results in participant order
    pub steps: Vec<StepOutput>,
    /// Final text: last agent's answer, the aggregate, or the synthesis
    pub output: String,
    pub usage: Usage,
}

impl WorkflowOutput {
    pub fn failed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| !s.is_success())
            .map(|s| s.agent.as_str())
            .collect()
    }
}

fn total_usage(steps: &[StepOutput]) -> Usage {
    let mut usage = Usage::default();
    for step in steps {
        if let Ok(response) = &step.result {
            usage.add(&response.usage);
        }
    }
    usage
}

/// Prompt for the agent after `previous`: the original request plus its answer
pub fn handoff_prompt(request: &str, previous: &str, output: &str) -> String {
    format!("{}\n\n--- Output from {} ---\n{}", request, previous, output)
}

/// Agents run one after another, each seeing the previous answer
pub struct SequentialWorkflow {
    name: String,
    agents: Vec<Arc<Agent>>,
}

impl SequentialWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
        }
    }

    /// Append an agent to the chain
    pub fn then(mut self, agent: Arc<Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    /// Run the chain; the first failing agent stops it and its error is returned
    pub async fn run(&self, prompt: &str) -> Result<WorkflowOutput> {
        if self.agents.is_empty() {
            return Err(ToolbeltError::Workflow(format!("'{}' has no agents", self.name)));
        }
        log::info!("Running sequential workflow '{}' over {} agents", self.name, self.agents.len());

        let mut steps = Vec::with_capacity(self.agents.len());
        let mut next_prompt = prompt.to_string();
        for agent in &self.agents {
            log::debug!("Workflow '{}' step: {}", self.name, agent.name);
            let response = agent.run(&next_prompt).await.map_err(|e| {
                log::error!("Workflow '{}' stopped at '{}': {}", self.name, agent.name, e);
                e
            })?;
            next_prompt = handoff_prompt(prompt, &agent.name, &response.content);
            steps.push(StepOutput {
                agent: agent.name.clone(),
                result: Ok(response),
            });
        }

        let output = steps.last().map(StepOutput::content).unwrap_or_default();
        Ok(WorkflowOutput {
            workflow: self.name.clone(),
            usage: total_usage(&steps),
            steps,
            output,
        })
    }
}

impl fmt::Debug for SequentialWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialWorkflow")
            .field("name", &self.name)
            .field("agents", &self.agent_names())
            .finish()
    }
}

/// Default aggregate: one section per participant, failures included
pub fn combine_results(steps: &[StepOutput]) -> String {
    let mut lines = vec!["=== Parallel Analysis Results ===".to_string()];
    for (i, step) in steps.iter().enumerate() {
        let status = if step.is_success() { "" } else { " (failed)" };
        lines.push(format!("\n--- Agent {}: {}{} ---", i + 1, step.agent, status));
        lines.push(step.content());
    }
    lines.join("\n")
}

/// Agents answer the same prompt at the same time
pub struct ConcurrentWorkflow {
    name: String,
    agents: Vec<Arc<Agent>>,
    aggregator: Arc<Aggregator>,
    synthesizer: Option<Arc<Agent>>,
}

impl ConcurrentWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            aggregator: Arc::new(combine_results),
            synthesizer: None,
        }
    }

    pub fn participant(mut self, agent: Arc<Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Replace the default aggregate formatting
    pub fn with_aggregator<F>(mut self, aggregator: F) -> Self
    where
        F: Fn(&[StepOutput]) -> String + Send + Sync + 'static,
    {
        self.aggregator = Arc::new(aggregator);
        self
    }

    /// Hand the aggregate to an agent that writes the final answer
    pub fn with_synthesizer(mut self, agent: Arc<Agent>) -> Self {
        self.synthesizer = Some(agent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    /// Run every participant; individual failures are kept in their step
    ///
    /// Fails only when no participant succeeds or the synthesizer fails.
    pub async fn run(&self, prompt: &str) -> Result<WorkflowOutput> {
        if self.agents.is_empty() {
            return Err(ToolbeltError::Workflow(format!("'{}' has no agents", self.name)));
        }
        log::info!("Running concurrent workflow '{}' over {} agents", self.name, self.agents.len());

        let mut join_set = JoinSet::new();
        for (index, agent) in self.agents.iter().enumerate() {
            let agent = Arc::clone(agent);
            let prompt = prompt.to_string();
            join_set.spawn(async move {
                let result = agent.run(&prompt).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<AgentResponse>>> = self.agents.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => {
                    match &result {
                        Ok(_) => log::info!("Agent '{}' finished", self.agents[index].name),
                        Err(e) => log::warn!("Agent '{}' failed: {}", self.agents[index].name, e),
                    }
                    results[index] = Some(result);
                }
                Err(e) => log::warn!("Workflow '{}' task join error: {}", self.name, e),
            }
        }

        let steps: Vec<StepOutput> = self
            .agents
            .iter()
            .zip(results)
            .map(|(agent, result)| StepOutput {
                agent: agent.name.clone(),
                result: result.unwrap_or_else(|| Err(ToolbeltError::Workflow("agent task did not complete".to_string()))),
            })
            .collect();

        if !steps.iter().any(StepOutput::is_success) {
            return Err(ToolbeltError::Workflow(format!(
                "every agent in '{}' failed: {}",
                self.name,
                steps.iter().map(|s| format!("{} ({})", s.agent, s.content())).collect::<Vec<_>>().join(", ")
            )));
        }

        let aggregate = (self.aggregator)(&steps);
        let mut usage = total_usage(&steps);
        let output = match &self.synthesizer {
            Some(synthesizer) => {
                log::debug!("Workflow '{}' synthesizing with '{}'", self.name, synthesizer.name);
                let synthesis = synthesizer.run(&format!("{}\n\n{}", prompt, aggregate)).await?;
                usage.add(&synthesis.usage);
                synthesis.content
            }
            None => aggregate,
        };

        Ok(WorkflowOutput {
            workflow: self.name.clone(),
            steps,
            output,
            usage,
        })
    }
}

impl fmt::Debug for ConcurrentWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentWorkflow")
            .field("name", &self.name)
            .field("agents", &self.agent_names())
            .field("synthesizer", &self.synthesizer.as_ref().map(|a| a.name.as_str()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatClient, CompletionRequest, CompletionResponse, MockChatClient};
    use async_trait::async_trait;

    fn mock_agent(name: &str, client: Arc<MockChatClient>) -> Arc<Agent> {
        Arc::new(Agent::new(name, name, format!("You are {}", name), Vec::new(), client))
    }

    struct FailingClient;

    #[async_trait]
    impl ChatClient for FailingClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Err(ToolbeltError::Llm("service unavailable".to_string()))
        }

        fn provider(&self) -> &str {
            "failing"
        }

        fn model(&self) -> &str {
            "none"
        }
    }

    fn failing_agent(name: &str) -> Arc<Agent> {
        Arc::new(Agent::new(name, name, "fails", Vec::new(), Arc::new(FailingClient)))
    }

    #[tokio::test]
    async fn test_sequential_hands_output_forward() {
        let stock_client = Arc::new(MockChatClient::new(vec![CompletionResponse::text("MSFT is up 2%")]));
        let advisor_client = Arc::new(MockChatClient::new(vec![CompletionResponse::text("Hold MSFT")]));
        let workflow = SequentialWorkflow::new("analysis")
            .then(mock_agent("StockAgent", stock_client.clone()))
            .then(mock_agent("Advisor", advisor_client.clone()));

        let output = workflow.run("How is MSFT?").await.unwrap();
        assert_eq!(output.output, "Hold MSFT");
        assert_eq!(output.steps.len(), 2);
        assert_eq!(output.steps[0].content(), "MSFT is up 2%");

        let stock_request = &stock_client.requests()[0];
        assert_eq!(stock_request.last_user_text().as_deref(), Some("How is MSFT?"));

        let advisor_prompt = advisor_client.requests()[0].last_user_text().unwrap();
        assert_eq!(advisor_prompt, handoff_prompt("How is MSFT?", "StockAgent", "MSFT is up 2%"));
        assert!(advisor_prompt.contains("--- Output from StockAgent ---"));
    }

    #[tokio::test]
    async fn test_sequential_stops_at_failure() {
        let last = Arc::new(MockChatClient::default());
        let workflow = SequentialWorkflow::new("broken")
            .then(mock_agent("First", Arc::new(MockChatClient::default())))
            .then(failing_agent("Second"))
            .then(mock_agent("Third", last.clone()));

        let err = workflow.run("go").await.unwrap_err();
        assert!(matches!(err, ToolbeltError::Llm(_)));
        assert!(last.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_workflows_rejected() {
        let err = SequentialWorkflow::new("empty").run("x").await.unwrap_err();
        assert!(matches!(err, ToolbeltError::Workflow(_)));
        let err = ConcurrentWorkflow::new("empty").run("x").await.unwrap_err();
        assert!(matches!(err, ToolbeltError::Workflow(_)));
    }

    #[tokio::test]
    async fn test_concurrent_collects_in_participant_order() {
        let workflow = ConcurrentWorkflow::new("multi")
            .participant(mock_agent("StockAgent", Arc::new(MockChatClient::new(vec![CompletionResponse::text("stocks")]))))
            .participant(mock_agent("WeatherAgent", Arc::new(MockChatClient::new(vec![CompletionResponse::text("sunny")]))));

        let output = workflow.run("Morning report").await.unwrap();
        let agents: Vec<&str> = output.steps.iter().map(|s| s.agent.as_str()).collect();
        assert_eq!(agents, vec!["StockAgent", "WeatherAgent"]);
        assert_eq!(output.steps[1].content(), "sunny");
        assert_eq!(
            output.output,
            "=== Parallel Analysis Results ===\n\n--- Agent 1: StockAgent ---\nstocks\n\n--- Agent 2: WeatherAgent ---\nsunny"
        );
    }

    #[tokio::test]
    async fn test_concurrent_keeps_partial_failures() {
        let workflow = ConcurrentWorkflow::new("partial")
            .participant(failing_agent("Broken"))
            .participant(mock_agent("Echo", Arc::new(MockChatClient::default())));

        let output = workflow.run("hello").await.unwrap();
        assert_eq!(output.failed_steps(), vec!["Broken"]);
        assert!(output.output.contains("--- Agent 1: Broken (failed) ---"));
        assert!(output.output.contains("[mock] hello"));
    }

    #[tokio::test]
    async fn test_concurrent_all_failed() {
        let workflow = ConcurrentWorkflow::new("down")
            .participant(failing_agent("A"))
            .participant(failing_agent("B"));
        let err = workflow.run("hello").await.unwrap_err();
        assert!(err.to_string().contains("every agent in 'down' failed"));
    }

    #[tokio::test]
    async fn test_custom_aggregator_and_synthesizer() {
        let synth_client = Arc::new(MockChatClient::new(vec![CompletionResponse::text("Buy umbrellas")]));
        let workflow = ConcurrentWorkflow::new("briefing")
            .participant(mock_agent("A", Arc::new(MockChatClient::new(vec![CompletionResponse::text("rain")]))))
            .participant(mock_agent("B", Arc::new(MockChatClient::new(vec![CompletionResponse::text("prices up")]))))
            .with_aggregator(|steps| steps.iter().map(StepOutput::content).collect::<Vec<_>>().join(" | "))
            .with_synthesizer(mock_agent("Synth", synth_client.clone()));

        let output = workflow.run("Brief me").await.unwrap();
        assert_eq!(output.output, "Buy umbrellas");
        let synth_prompt = synth_client.requests()[0].last_user_text().unwrap();
        assert_eq!(synth_prompt, "Brief me\n\nrain | prices up");
    }
}
