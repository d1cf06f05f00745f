use llm_client::{ChatMessage, ChatRequest, ClientError, LlmClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = LlmClient::from_env()?;

    let text = client
        .chat_completion(ChatRequest::one_shot(
            "gpt-5-nano",
            vec![
                ChatMessage::system("You are a concise assistant."),
                ChatMessage::user("what's up?"),
            ],
        ))
        .await?
        .collect_text()
        .await?;

    println!("{text}");
    client.close().await;
    Ok(())
}
