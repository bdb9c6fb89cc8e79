use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::BehaviorError;

/// Where the model looks, as a fraction of the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GazeDirection {
    Straight,
    Left,
    Right,
    Up,
    Down,
}

impl GazeDirection {
    /// Order matching the weight array
    pub const ALL: [GazeDirection; 5] = [
        GazeDirection::Straight,
        GazeDirection::Left,
        GazeDirection::Right,
        GazeDirection::Up,
        GazeDirection::Down,
    ];

    fn fraction(self) -> (f32, f32) {
        match self {
            GazeDirection::Straight => (0.5, 0.5),
            GazeDirection::Left => (0.2, 0.5),
            GazeDirection::Right => (0.8, 0.5),
            GazeDirection::Up => (0.5, 0.2),
            GazeDirection::Down => (0.5, 0.8),
        }
    }

    /// Pixel target on a `width` x `height` canvas
    pub fn target(self, width: u32, height: u32) -> (f32, f32) {
        let (fx, fy) = self.fraction();
        (fx * width as f32, fy * height as f32)
    }
}

/// Weighted random gaze picker
pub struct GazeSelector {
    weights: WeightedIndex<u32>,
    width: u32,
    height: u32,
    rng: StdRng,
}

impl GazeSelector {
    /// `weights` follow [`GazeDirection::ALL`]
    pub fn new(weights: [u32; 5], width: u32, height: u32) -> Result<Self, BehaviorError> {
        let weights =
            WeightedIndex::new(weights).map_err(|e| BehaviorError::Weights(e.to_string()))?;
        Ok(Self {
            weights,
            width,
            height,
            rng: StdRng::from_os_rng(),
        })
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn next_direction(&mut self) -> GazeDirection {
        GazeDirection::ALL[self.weights.sample(&mut self.rng)]
    }

    pub fn target(&self, direction: GazeDirection) -> (f32, f32) {
        direction.target(self.width, self.height)
    }
}
