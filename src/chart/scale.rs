pub const MIN_BAR_SPACING: f32 = 1.0;
pub const MAX_BAR_SPACING: f32 = 100.0;

/// How many horizontal grid labels the overlay aims for.
pub const LABEL_TARGET: i32 = 8;

/// Horizontal coordinate math. Index 0 is the most recent (rightmost) bar;
/// increasing index moves left, further into the past. The scroll offset
/// is unit-less bars from the right edge and may be negative or exceed the
/// history length; clamping is the caller's business.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScaleEngine {
    width: f32,
    bar_spacing: f32,
    scroll_offset: f32,
    right_margin: f32,
}

impl TimeScaleEngine {
    pub fn new(width: f32, bar_spacing: f32, right_margin: f32) -> Self {
        Self {
            width,
            bar_spacing: bar_spacing.clamp(MIN_BAR_SPACING, MAX_BAR_SPACING),
            scroll_offset: 0.0,
            right_margin,
        }
    }

    pub fn index_to_x(&self, index: f32) -> f32 {
        self.width - self.right_margin - (index + self.scroll_offset) * self.bar_spacing
    }

    pub fn x_to_index(&self, x: f32) -> f32 {
        (self.width - self.right_margin - x) / self.bar_spacing - self.scroll_offset
    }

    /// Multiplies bar spacing and re-clamps.
    pub fn zoom(&mut self, factor: f32) {
        self.bar_spacing = (self.bar_spacing * factor).clamp(MIN_BAR_SPACING, MAX_BAR_SPACING);
    }

    pub fn scroll_by(&mut self, bars: f32) {
        self.scroll_offset += bars;
    }

    pub fn set_scroll_offset(&mut self, bars: f32) {
        self.scroll_offset = bars;
    }

    pub fn resize(&mut self, width: f32) {
        self.width = width;
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn bar_spacing(&self) -> f32 {
        self.bar_spacing
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }
}

/// Vertical coordinate math: maps the visible price range linearly onto
/// pixel rows, highest price at y = 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceScaleEngine {
    height: f32,
    lowest: f32,
    highest: f32,
}

impl PriceScaleEngine {
    pub fn new(height: f32, lowest: f32, highest: f32) -> Self {
        Self {
            height,
            lowest,
            highest,
        }
    }

    fn range(&self) -> f32 {
        (self.highest - self.lowest).max(f32::EPSILON)
    }

    pub fn price_to_y(&self, price: f32) -> f32 {
        self.height * (self.highest - price) / self.range()
    }

    pub fn y_to_price(&self, y: f32) -> f32 {
        self.highest - (y / self.height) * self.range()
    }

    /// Projected pixel height of one price step at the current zoom.
    pub fn step_height(&self, step: f32) -> f32 {
        self.height * step / self.range()
    }

    /// Fit the visible range to data extremes, with a little headroom so
    /// extremes do not sit on the viewport edge.
    pub fn fit(&mut self, lowest: f32, highest: f32) {
        let padding = (highest - lowest).abs().max(f32::EPSILON) * 0.05;
        self.lowest = lowest - padding;
        self.highest = highest + padding;
    }

    /// Derive the visible range from a target cell pixel height: how many
    /// price levels of `step` fit the viewport, centered on `center`.
    pub fn fit_to_cells(&mut self, center: f32, step: f32, cell_height: f32) {
        let levels = self.height / cell_height.max(1.0);
        let half_span = levels * step / 2.0;
        self.lowest = center - half_span;
        self.highest = center + half_span;
    }

    pub fn resize(&mut self, height: f32) {
        self.height = height;
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn visible_range(&self) -> (f32, f32) {
        (self.lowest, self.highest)
    }
}

const MAX_LABEL_STEPS: usize = 1000;

/// Canonical 1-2-5-10 stepping: picks the grid step so that roughly
/// `labels_can_fit` labels cover `lowest..highest`, and returns the step
/// together with the first line at or above `highest`.
pub fn calc_optimal_ticks(highest: f32, lowest: f32, labels_can_fit: i32) -> (f32, f32) {
    let range = (highest - lowest).abs().max(f32::EPSILON);
    let labels = labels_can_fit.max(1) as f32;

    let base = 10.0f32.powf(range.log10().floor());

    let step = match range / base {
        r if r <= labels * 0.1 => 0.1 * base,
        r if r <= labels * 0.2 => 0.2 * base,
        r if r <= labels * 0.5 => 0.5 * base,
        r if r <= labels => base,
        r if r <= labels * 2.0 => 2.0 * base,
        _ => (range / labels).min(5.0 * base),
    };

    let rounded_highest = (highest / step).ceil() * step;
    (step, rounded_highest)
}

/// Grid line values from high to low, ready for the overlay.
pub fn price_grid_lines(highest: f32, lowest: f32, labels_can_fit: i32) -> Vec<f32> {
    if !highest.is_finite() || !lowest.is_finite() || (highest - lowest).abs() < f32::EPSILON {
        return Vec::new();
    }

    let (step, max) = calc_optimal_ticks(highest, lowest, labels_can_fit);

    let mut value = max;
    while value > highest {
        value -= step;
    }

    let mut lines = Vec::with_capacity((labels_can_fit + 2) as usize);
    let mut safety_counter = 0;

    while value >= lowest && safety_counter < MAX_LABEL_STEPS {
        lines.push(value);
        value -= step;
        safety_counter += 1;
    }

    lines
}
