//! Nearest-prototype classifier for iris measurements.
//!
//! Each of the 21 prototypes is a point in normalized measurement space.
//! An input activates every prototype by its normalized Manhattan
//! similarity; the single strongest prototype wins and its class weights
//! scale that activation into the three species scores.
//!
//! The tables are `static` and never mutated, so one `Classifier` is
//! shared by every session without synchronization.

use std::fmt;

/// Number of measurement inputs.
pub const INPUTS: usize = 4;

/// Number of output classes.
pub const CLASSES: usize = 3;

/// Input-to-prototype weights.
static PROTOTYPES: [[f64; INPUTS]; 21] = [
    [0.0868056, 0.598958, 0.0338983, 0.0520833],
    [0.292155, 0.835368, 0.0742519, 0.0353597],
    [0.0, 0.416667, 0.0169492, 0.0],
    [0.0277778, 0.375, 0.0677966, 0.0416667],
    [0.153646, 0.458984, 0.0913665, 0.0188802],
    [0.248318, 0.581624, 0.100437, 0.11263],
    [0.51796, 0.336184, 0.657193, 0.608349],
    [0.398003, 0.274089, 0.476695, 0.430339],
    [0.533854, 0.328125, 0.753708, 0.852865],
    [0.770942, 0.459066, 0.81495, 0.69987],
    [0.472222, 0.0833333, 0.677966, 0.583333],
    [0.520833, 0.364583, 0.65678, 0.708333],
    [0.527778, 0.291667, 0.737288, 0.5625],
    [0.472222, 0.0833333, 0.508475, 0.375],
    [0.194444, 0.0, 0.423729, 0.375],
    [0.166667, 0.166667, 0.389831, 0.375],
    [0.333333, 0.15625, 0.474576, 0.416667],
    [0.947049, 0.555786, 0.914642, 0.79484],
    [0.166667, 0.208333, 0.59322, 0.666667],
    [0.305556, 0.416667, 0.59322, 0.583333],
    [0.254341, 0.405438, 0.337138, 0.590991],
];

/// Prototype-to-class weights, one row per prototype.
static CLASS_WEIGHTS: [[f64; CLASSES]; 21] = [
    [1.11242, 0.0, 0.0],
    [1.12293, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.09285, 0.0, 0.0],
    [1.11192, 0.0, 0.0],
    [0.0, 1.10733, 0.0],
    [0.0, 1.07566, 0.0],
    [0.0, 0.0, 1.05761],
    [0.0, 0.0, 1.06506],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, 1.02192],
    [0.0, 0.0, 1.03032],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.03888, 0.0],
    [0.0, 0.0, 1.08482],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [0.770013, 0.503372, 0.197485],
];

static IRIS: Classifier = Classifier {
    prototypes: &PROTOTYPES,
    class_weights: &CLASS_WEIGHTS,
};

/// Iris species, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Species {
    Setosa,
    Versicolor,
    Virginica,
}

impl Species {
    /// All species in output order.
    pub const ALL: [Species; CLASSES] = [Species::Setosa, Species::Versicolor, Species::Virginica];

    /// Label used when listing raw scores.
    pub fn label(self) -> &'static str {
        match self {
            Species::Setosa => "IrisSetosa",
            Species::Versicolor => "IrisVersicolor",
            Species::Virginica => "IrisVirginica",
        }
    }

    /// Pick the highest-scoring species. Ties go to the earliest species.
    pub fn best(scores: &[f64; CLASSES]) -> Species {
        let mut best = 0;
        for (i, score) in scores.iter().enumerate().skip(1) {
            if *score > scores[best] {
                best = i;
            }
        }
        Species::ALL[best]
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Species::Setosa => "Iris setosa",
            Species::Versicolor => "Iris versicolor",
            Species::Virginica => "Iris virginica",
        };
        f.write_str(name)
    }
}

/// Fixed-weight nearest-prototype classifier.
#[derive(Debug)]
pub struct Classifier {
    prototypes: &'static [[f64; INPUTS]],
    class_weights: &'static [[f64; CLASSES]],
}

impl Classifier {
    /// The built-in iris model.
    pub fn iris() -> &'static Classifier {
        &IRIS
    }

    /// Build a classifier over custom tables.
    ///
    /// Both tables must have one row per prototype.
    #[cfg(test)]
    fn new(prototypes: &'static [[f64; INPUTS]], class_weights: &'static [[f64; CLASSES]]) -> Self {
        assert_eq!(prototypes.len(), class_weights.len());
        Classifier {
            prototypes,
            class_weights,
        }
    }

    /// Score a normalized measurement vector against the three species.
    ///
    /// Scores are bounded above by 1.0 but are not a probability
    /// distribution. Callers validate that every input lies in [0, 1].
    pub fn classify(&self, input: &[f64; INPUTS]) -> [f64; CLASSES] {
        let (winner, activation) = self.nearest_prototype(input);
        let weights = &self.class_weights[winner];

        let mut output = [0.0; CLASSES];
        for (out, weight) in output.iter_mut().zip(weights) {
            *out = saturate(activation * weight);
        }
        output
    }

    /// Find the most strongly activated prototype.
    ///
    /// Returns its index and activation. The first prototype wins ties, and
    /// prototype 0 is reported when nothing activates above zero.
    fn nearest_prototype(&self, input: &[f64; INPUTS]) -> (usize, f64) {
        let mut winner = 0;
        let mut max_activation = 0.0;

        for (idx, prototype) in self.prototypes.iter().enumerate() {
            let activation = saturate(1.0 - distance(input, prototype));
            if activation > max_activation {
                max_activation = activation;
                winner = idx;
            }
        }

        (winner, max_activation)
    }
}

/// Normalized Manhattan distance between an input and a prototype.
fn distance(input: &[f64; INPUTS], prototype: &[f64; INPUTS]) -> f64 {
    let mut diff_sum = 0.0;
    let mut total_sum = 0.0;
    for (x, p) in input.iter().zip(prototype) {
        diff_sum += (x - p).abs();
        total_sum += x + p;
    }

    // Both vectors at the origin: treat as an exact match
    if total_sum == 0.0 {
        return 0.0;
    }
    diff_sum / total_sum
}

/// Clamp from above at 1.0. No lower bound.
fn saturate(x: f64) -> f64 {
    if x > 1.0 {
        1.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 5.1 / 3.5 / 1.4 / 0.2 normalized against the variable ranges.
    fn setosa_sample() -> [f64; INPUTS] {
        [
            (5.1 - 4.3) / (7.9 - 4.3),
            (3.5 - 2.0) / (4.4 - 2.0),
            (1.4 - 1.0) / (6.9 - 1.0),
            (0.2 - 0.1) / (2.5 - 0.1),
        ]
    }

    #[test]
    fn test_tables_are_aligned() {
        assert_eq!(PROTOTYPES.len(), CLASS_WEIGHTS.len());
    }

    #[test]
    fn test_classify_setosa_sample() {
        let output = Classifier::iris().classify(&setosa_sample());
        assert_eq!(Species::best(&output), Species::Setosa);
        assert_eq!(output[0], 1.0);
        assert_eq!(output[1], 0.0);
        assert_eq!(output[2], 0.0);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let input = [0.42, 0.17, 0.63, 0.55];
        let first = Classifier::iris().classify(&input);
        let second = Classifier::iris().classify(&input);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_exact_prototype_match() {
        // Prototype 6 is a versicolor prototype with weight > 1
        let (winner, activation) = Classifier::iris().nearest_prototype(&PROTOTYPES[6]);
        assert_eq!(winner, 6);
        assert_eq!(activation, 1.0);

        let output = Classifier::iris().classify(&PROTOTYPES[6]);
        assert_eq!(output, [0.0, 1.0, 0.0]);
        assert_eq!(Species::best(&output), Species::Versicolor);
    }

    #[test]
    fn test_virginica_prototype() {
        let output = Classifier::iris().classify(&PROTOTYPES[10]);
        assert_eq!(output, [0.0, 0.0, 1.0]);
        assert_eq!(Species::best(&output), Species::Virginica);
    }

    #[test]
    fn test_mixed_prototype_scores() {
        let output = Classifier::iris().classify(&PROTOTYPES[20]);
        assert_eq!(output, [0.770013, 0.503372, 0.197485]);
    }

    #[test]
    fn test_zero_vector_falls_back_to_first_prototype() {
        // Every prototype is at distance 1, so nothing activates above zero
        let (winner, activation) = Classifier::iris().nearest_prototype(&[0.0; INPUTS]);
        assert_eq!(winner, 0);
        assert_eq!(activation, 0.0);
        assert_eq!(Classifier::iris().classify(&[0.0; INPUTS]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_tie_goes_to_first_prototype() {
        static TWINS: [[f64; INPUTS]; 2] = [[0.5; INPUTS], [0.5; INPUTS]];
        static WEIGHTS: [[f64; CLASSES]; 2] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

        let classifier = Classifier::new(&TWINS, &WEIGHTS);
        assert_eq!(classifier.nearest_prototype(&[0.5; INPUTS]), (0, 1.0));
        assert_eq!(classifier.classify(&[0.5; INPUTS]), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_distance_at_origin_is_zero() {
        assert_eq!(distance(&[0.0; INPUTS], &[0.0; INPUTS]), 0.0);

        static ORIGIN: [[f64; INPUTS]; 1] = [[0.0; INPUTS]];
        static WEIGHTS: [[f64; CLASSES]; 1] = [[0.0, 0.0, 2.0]];
        let classifier = Classifier::new(&ORIGIN, &WEIGHTS);
        assert_eq!(classifier.classify(&[0.0; INPUTS]), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_saturate_has_no_lower_clamp() {
        assert_eq!(saturate(1.5), 1.0);
        assert_eq!(saturate(0.25), 0.25);
        assert_eq!(saturate(-0.5), -0.5);
    }

    #[test]
    fn test_best_species_first_max_wins() {
        assert_eq!(Species::best(&[0.3, 0.3, 0.1]), Species::Setosa);
        assert_eq!(Species::best(&[0.1, 0.4, 0.4]), Species::Versicolor);
        assert_eq!(Species::best(&[0.0, 0.0, 0.2]), Species::Virginica);
        assert_eq!(Species::best(&[0.0, 0.0, 0.0]), Species::Setosa);
    }

    #[test]
    fn test_species_names() {
        assert_eq!(Species::Setosa.label(), "IrisSetosa");
        assert_eq!(Species::Virginica.to_string(), "Iris virginica");
    }
}
