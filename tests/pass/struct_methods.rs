use timelog::timed;

struct Calculator {
    value: i32,
}

impl Calculator {
    #[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
    fn new(value: i32) -> Self {
        Self { value }
    }

    #[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
    fn add(&mut self, x: i32) -> i32 {
        self.value += x;
        self.value
    }

    #[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"), extra_msg = format!("value={}", self.value))]
    fn get_value(&self) -> i32 {
        self.value
    }

    #[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
    fn into_value(self) -> i32 {
        self.value
    }
}

trait Shape {
    fn area(&self) -> f64;
}

struct Square(f64);

impl Shape for Square {
    #[timed(log_dir = std::env::temp_dir().join("timelog-trybuild"))]
    fn area(&self) -> f64 {
        self.0 * self.0
    }
}

fn main() {
    let mut calc = Calculator::new(5);
    assert_eq!(calc.add(3), 8);
    assert_eq!(calc.get_value(), 8);
    assert_eq!(calc.into_value(), 8);
    assert_eq!(Square(3.0).area(), 9.0);
}
