use std::path::Path;

use crate::config::Config;
use crate::publisher::read_topic;

pub async fn cmd_consume(config: &Config, topics: &[String]) -> anyhow::Result<()> {
    let topics = if topics.is_empty() {
        vec![
            config.publisher.user_topic.clone(),
            config.publisher.media_topic.clone(),
        ]
    } else {
        topics.to_vec()
    };

    let dir = Path::new(&config.publisher.output_path);
    for topic in &topics {
        let messages = read_topic(dir, topic).await?;
        eprintln!("{}: {} messages", topic, messages.len());
        for message in messages {
            println!("{}", serde_json::to_string(&message)?);
        }
    }

    Ok(())
}
