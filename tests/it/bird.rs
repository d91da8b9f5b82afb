//! A hand-written mock in the shape the code generator produces.

use decoy::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fruit {
    Apple,
    Watermelon,
    Pear,
}

pub trait Bird {
    fn can_fly(&self) -> bool;
    fn fly(&self);
    fn can_eat(&self, fruit: Fruit) -> bool;
    fn eat(&self, fruit: Fruit);
    fn chirp(&self, volume: u8) -> String;
    fn set_name(&self, name: String);
    fn name(&self) -> Option<String>;
    fn perch(&self, branch: Option<u32>) -> bool;
    fn eat_all(&self, fruits: Vec<Fruit>);
    fn glide(&self, altitude: f64) -> bool;
}

#[derive(Clone)]
pub struct BirdMock {
    mock: Mock,
}

impl BirdMock {
    pub fn new() -> Self {
        Self {
            mock: Mock::new("BirdMock"),
        }
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            mock: Mock::with_config(config),
        }
    }

    #[track_caller]
    pub fn can_fly(&self) -> bool {
        self.mock.call("can_fly", vec![])
    }

    #[track_caller]
    pub fn fly(&self) {
        self.mock.call("fly", vec![])
    }

    #[track_caller]
    pub fn can_eat(&self, fruit: impl IntoArg<Fruit>) -> bool {
        self.mock
            .call("can_eat", vec![fruit.into_arg().into_matcher()])
    }

    #[track_caller]
    pub fn eat(&self, fruit: impl IntoArg<Fruit>) {
        self.mock.call("eat", vec![fruit.into_arg().into_matcher()])
    }

    #[track_caller]
    pub fn chirp(&self, volume: impl IntoArg<u8>) -> String {
        self.mock
            .call("chirp", vec![volume.into_arg().into_matcher()])
    }

    #[track_caller]
    pub fn set_name(&self, name: impl IntoArg<String>) {
        self.mock
            .call("set_name", vec![name.into_arg().into_matcher()])
    }

    #[track_caller]
    pub fn name(&self) -> Option<String> {
        self.mock.call_optional("name", vec![])
    }

    #[track_caller]
    pub fn perch(&self, branch: impl IntoArg<Option<u32>>) -> bool {
        self.mock
            .call("perch", vec![branch.into_arg().into_matcher()])
    }

    #[track_caller]
    pub fn eat_all(&self, fruits: impl IntoArg<Vec<Fruit>>) {
        self.mock
            .call("eat_all", vec![fruits.into_arg().into_matcher()])
    }

    #[track_caller]
    pub fn glide(&self, altitude: impl IntoArg<f64>) -> bool {
        self.mock
            .call("glide", vec![altitude.into_arg().into_matcher()])
    }
}

impl Mocked for BirdMock {
    fn mock(&self) -> &Mock {
        &self.mock
    }
}

impl Bird for BirdMock {
    #[track_caller]
    fn can_fly(&self) -> bool {
        BirdMock::can_fly(self)
    }

    #[track_caller]
    fn fly(&self) {
        BirdMock::fly(self)
    }

    #[track_caller]
    fn can_eat(&self, fruit: Fruit) -> bool {
        BirdMock::can_eat(self, fruit)
    }

    #[track_caller]
    fn eat(&self, fruit: Fruit) {
        BirdMock::eat(self, fruit)
    }

    #[track_caller]
    fn chirp(&self, volume: u8) -> String {
        BirdMock::chirp(self, volume)
    }

    #[track_caller]
    fn set_name(&self, name: String) {
        BirdMock::set_name(self, name)
    }

    #[track_caller]
    fn name(&self) -> Option<String> {
        BirdMock::name(self)
    }

    #[track_caller]
    fn perch(&self, branch: Option<u32>) -> bool {
        BirdMock::perch(self, branch)
    }

    #[track_caller]
    fn eat_all(&self, fruits: Vec<Fruit>) {
        BirdMock::eat_all(self, fruits)
    }

    #[track_caller]
    fn glide(&self, altitude: f64) -> bool {
        BirdMock::glide(self, altitude)
    }
}

/// Code under test.
pub fn go_flying(bird: &impl Bird) {
    if bird.can_fly() {
        bird.fly();
        bird.fly();
    }
}

/// Code under test.
pub fn feed(bird: &impl Bird, fruits: &[Fruit]) {
    for fruit in fruits {
        if bird.can_eat(*fruit) {
            bird.eat(*fruit);
        }
    }
}
