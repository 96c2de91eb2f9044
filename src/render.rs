pub mod overlay;
pub mod shapes;

use crate::chart::ChartMapper;
use crate::style::Palette;

use data::aggr::InstrumentSeries;
use data::config::FootprintSettings;

use iced_core::{Color, Point, Size};

/// Where a text label hangs off its position.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    #[default]
    TopLeft,
    Center,
    BottomCenter,
    CenterLeft,
    CenterRight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub content: String,
    pub position: Point,
    pub size: f32,
    pub color: Color,
    pub anchor: TextAnchor,
}

/// The render target, borrowed for the duration of one frame. Renderers
/// never own the surface, which keeps the pipeline drawable headless into
/// a [`MemoryFrame`].
pub trait Surface {
    fn fill_rectangle(&mut self, top_left: Point, size: Size, color: Color);
    fn stroke_rectangle(&mut self, top_left: Point, size: Size, stroke_width: f32, color: Color);
    fn stroke_line(&mut self, from: Point, to: Point, stroke_width: f32, color: Color);
    fn fill_text(&mut self, text: Text);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRectangle {
        top_left: Point,
        size: Size,
        color: Color,
    },
    StrokeRectangle {
        top_left: Point,
        size: Size,
        stroke_width: f32,
        color: Color,
    },
    StrokeLine {
        from: Point,
        to: Point,
        stroke_width: f32,
        color: Color,
    },
    FillText(Text),
}

/// In-memory surface recording draw commands in submission order, for
/// headless rendering and tests.
#[derive(Debug, Default)]
pub struct MemoryFrame {
    pub commands: Vec<DrawCommand>,
}

impl MemoryFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> impl Iterator<Item = &Text> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::FillText(text) => Some(text),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Surface for MemoryFrame {
    fn fill_rectangle(&mut self, top_left: Point, size: Size, color: Color) {
        self.commands.push(DrawCommand::FillRectangle {
            top_left,
            size,
            color,
        });
    }

    fn stroke_rectangle(&mut self, top_left: Point, size: Size, stroke_width: f32, color: Color) {
        self.commands.push(DrawCommand::StrokeRectangle {
            top_left,
            size,
            stroke_width,
            color,
        });
    }

    fn stroke_line(&mut self, from: Point, to: Point, stroke_width: f32, color: Color) {
        self.commands.push(DrawCommand::StrokeLine {
            from,
            to,
            stroke_width,
            color,
        });
    }

    fn fill_text(&mut self, text: Text) {
        self.commands.push(DrawCommand::FillText(text));
    }
}

/// One frame of the footprint chart. The stage ordering is the contract:
/// the shape layer draws first, the text overlay second, so labels always
/// sit on top of boxes. Call sites cannot reorder the stages.
pub struct RenderPass<'a> {
    pub mapper: ChartMapper<'a>,
    pub palette: &'a Palette,
    pub settings: &'a FootprintSettings,
}

impl<'a> RenderPass<'a> {
    pub fn new(
        mapper: ChartMapper<'a>,
        palette: &'a Palette,
        settings: &'a FootprintSettings,
    ) -> Self {
        Self {
            mapper,
            palette,
            settings,
        }
    }

    pub fn draw(&self, frame: &mut impl Surface, series: &InstrumentSeries) {
        shapes::draw(frame, self, series);
        overlay::draw(frame, self, series);
    }

    /// Cheap horizontal cull before any per-cell work: a candle whose
    /// column lies fully outside the viewport is skipped.
    pub(crate) fn is_column_visible(&self, x: f32) -> bool {
        let spacing = self.mapper.time.bar_spacing();
        x + spacing >= 0.0 && x - spacing <= self.mapper.time.width()
    }

    /// Pixel step of one price level at the current zoom, honoring the
    /// grouping multiplier.
    pub(crate) fn cell_height_px(&self, series: &InstrumentSeries) -> f32 {
        let step = series
            .tick_size()
            .multiplied(self.settings.tick_multiplier)
            .to_f32();
        self.mapper.price.step_height(step)
    }
}
