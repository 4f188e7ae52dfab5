//! Pipeline configuration.

use std::fmt;

/// How tiles are decoded and re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Pick per directory: shared tables when `JPEGTables` is present.
    #[default]
    Auto,
    /// Every tile is an independent JPEG stream.
    SelfContained,
    /// Tiles are abbreviated streams sharing the directory's `JPEGTables`.
    SharedTables,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::SelfContained => "self-contained",
            Self::SharedTables => "shared-tables",
        })
    }
}

/// Options for [`Recolorer`](crate::Recolorer).
///
/// # Example
///
/// ```rust
/// use wsi_pipeline::RecolorOptions;
///
/// let options = RecolorOptions {
///     quality: 80,
///     skip: 2,
///     ..Default::default()
/// };
/// assert_eq!(options.workers, 4);
/// ```
#[derive(Debug, Clone)]
pub struct RecolorOptions {
    /// Parallel decode/recolor/encode workers. Default: 4.
    pub workers: usize,
    /// Encode quality 0-100. Default: 87.
    pub quality: u8,
    /// Tiles copied verbatim after each recolored tile. Default: 0.
    pub skip: usize,
    /// Codec strategy. Default: auto.
    pub strategy: StrategyKind,
    /// Re-encode shared-table tiles at `quality` with their own quantization
    /// tables instead of the directory's. Default: false.
    pub requantize: bool,
    /// Draw tile indices and corner markers before re-encoding.
    pub annotate: bool,
    /// Capacity of the producer-to-consumer channel of the shared-tables
    /// strategy. Default: 8.
    pub channel_capacity: usize,
}

impl Default for RecolorOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            quality: 87,
            skip: 0,
            strategy: StrategyKind::Auto,
            requantize: false,
            annotate: false,
            channel_capacity: 8,
        }
    }
}

impl RecolorOptions {
    /// Clamps out-of-range values to the nearest usable one.
    pub fn normalized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.quality = self.quality.min(100);
        self.channel_capacity = self.channel_capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = RecolorOptions::default();
        assert_eq!((o.workers, o.quality, o.skip), (4, 87, 0));
        assert_eq!(o.strategy, StrategyKind::Auto);
        assert!(!o.annotate);
        assert!(!o.requantize);
    }

    #[test]
    fn test_normalized() {
        let o = RecolorOptions {
            workers: 0,
            quality: 150,
            channel_capacity: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!((o.workers, o.quality, o.channel_capacity), (1, 100, 1));
    }
}
