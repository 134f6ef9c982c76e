use timelog::timed;

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
fn normal_function(x: i32) -> i32 {
    x + 1
}

#[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
pub fn public_function(x: i32) -> i32 {
    x * 2
}

fn main() {
    assert_eq!(normal_function(5), 6);
    assert_eq!(public_function(5), 10);
}
