//! Three-sample moving average over corrected temperatures.

/// Number of samples averaged by [`Smoother`].
pub const WINDOW: usize = 3;

/// Fixed-width moving average, most recent sample first.
///
/// The window is seeded with the first value it sees so the first few
/// averages are not dragged towards zero.
#[derive(Debug, Clone, Default)]
pub struct Smoother {
    window: Option<[f64; WINDOW]>,
}

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` and return the average of the window.
    ///
    /// A window holding one repeated value averages to exactly that value.
    pub fn push(&mut self, value: f64) -> f64 {
        // ---
        let Some(mut window) = self.window else {
            self.window = Some([value; WINDOW]);
            return value;
        };
        window.rotate_right(1);
        window[0] = value;
        self.window = Some(window);

        if window.iter().all(|v| *v == value) {
            return value;
        }
        window.iter().sum::<f64>() / WINDOW as f64
    }

    /// Current window contents, most recent first.
    #[cfg(test)]
    fn window(&self) -> Option<&[f64; WINDOW]> {
        self.window.as_ref()
    }
}
