use std::fmt::Display;
use timelog::timed;

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
fn describe<T: Display>(value: T) -> String {
    format!("<{value}>")
}

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
fn sum_all<I>(items: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    items.into_iter().sum()
}

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
fn evens(limit: u32) -> impl Iterator<Item = u32> {
    (0..limit).filter(|n| n % 2 == 0)
}

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
fn first_word<'a>(text: &'a str) -> &'a str {
    text.split_whitespace().next().unwrap_or("")
}

fn main() {
    assert_eq!(describe(42), "<42>");
    assert_eq!(describe("x"), "<x>");
    assert_eq!(sum_all(vec![1, 2, 3]), 6);
    assert_eq!(evens(7).count(), 4);
    assert_eq!(first_word("hello world"), "hello");
}
