//! Run a small review machine with the echo delegate.

use std::sync::Arc;
use dygram_engine::{EchoDelegate, Engine, MachineDefinition};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  let json = r#"
    {
      "title": "Simple Review",
      "attributes": { "maxSteps": 20 },
      "nodes": [
        { "name": "start", "type": "init" },
        { "name": "draft", "type": "context", "attributes": { "topic": "release notes" } },
        { "name": "write", "attributes": { "prompt": "Write {{ draft.topic }}" } },
        { "name": "review", "type": "task", "attributes": { "prompt": "Review: {{ write.result }}" } },
        { "name": "done", "type": "state" }
      ],
      "edges": [
        { "source": "start", "target": "write" },
        { "source": "draft", "target": "write" },
        { "source": "write", "target": "review" },
        { "source": "review", "target": "done", "condition": { "unless": "errorCount > 0" } }
      ]
    }
  "#;

  let definition = MachineDefinition::from_json(json)?;
  let mut engine = Engine::from_definition(definition, Arc::new(EchoDelegate))?;
  let r = engine.run().await;

  println!("Machine run finished.");
  println!("  Status: {:?}", r.status);
  println!("  Steps: {}", r.steps);
  for t in &r.history {
    println!("  {} -> {}", t.from, t.to);
  }
  println!("  Review: {}", r.context["nodes"]["review"]["result"]);
  Ok(())
}
