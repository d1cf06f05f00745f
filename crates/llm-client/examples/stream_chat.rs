use llm_client::{ChatMessage, ChatRequest, ClientError, LlmClient, StreamEvent};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = LlmClient::from_env()?;

    let mut stream = client
        .chat_completion(ChatRequest::streaming(
            "gpt-5-nano",
            vec![ChatMessage::user("Stream a short greeting.")],
        ))
        .await?;

    while let Some(event) = stream.next_event().await {
        match event {
            StreamEvent::TextDelta(delta) => print!("{}", delta.content),
            StreamEvent::MessageComplete { usage, .. } => {
                println!();
                if let Some(usage) = usage {
                    eprintln!("tokens: {} total", usage.total_tokens);
                }
            }
            StreamEvent::Error { message } => eprintln!("call failed: {message}"),
        }
    }

    client.close().await;
    Ok(())
}
