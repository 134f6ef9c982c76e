use std::time::Duration;
use timelog::timed;

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
async fn async_function(x: i32) -> i32 {
    tokio::time::sleep(Duration::from_millis(1)).await;
    x + 1
}

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
async fn async_fallible(text: &str) -> Result<i32, std::num::ParseIntError> {
    let value: i32 = text.parse()?;
    Ok(value)
}

#[tokio::main]
async fn main() {
    assert_eq!(async_function(5).await, 6);
    assert_eq!(async_fallible("12").await, Ok(12));
    assert!(async_fallible("twelve").await.is_err());

    let handle = tokio::spawn(async_function(1));
    assert_eq!(handle.await.unwrap(), 2);
}
