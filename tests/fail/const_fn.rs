use timelog::timed;

#[timed]
const fn answer() -> u8 {
    42
}

fn main() {}
