use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pixel_buffer::PixelBuffer;

/// Upper bound on blit/show attempts for one presented frame
pub const MAX_PRESENT_ATTEMPTS: u32 = 8;

/// Scaling quality used when a frame is stretched to the device size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityHint {
    /// Nearest-neighbour
    Low,
    /// Linear magnification, nearest minification
    #[default]
    Mid,
    /// Linear both ways
    High,
    /// Linear both ways with anisotropic filtering where available
    Highest,
}

impl QualityHint {
    pub const ALL: [QualityHint; 4] = [
        QualityHint::Low,
        QualityHint::Mid,
        QualityHint::High,
        QualityHint::Highest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityHint::Low => "low",
            QualityHint::Mid => "mid",
            QualityHint::High => "high",
            QualityHint::Highest => "highest",
        }
    }
}

impl fmt::Display for QualityHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityHint::ALL
            .into_iter()
            .find(|hint| hint.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown quality hint `{s}` (expected low, mid, high or highest)"))
    }
}

/// Outcome of one blit or flip on a platform surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    Ok,
    /// The platform discarded the surface contents; the step must be redone
    ContentsLost,
}

/// Presentation failure that retrying cannot fix
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("surface out of memory")]
    OutOfMemory,
    #[error("surface unavailable: {0}")]
    Unavailable(String),
}

/// Double-buffered presentation surface of one window
pub trait BufferStrategy: Send {
    /// Draw `frame`, stretched to the device size, onto the back surface
    fn blit(&mut self, frame: &PixelBuffer, hint: QualityHint) -> Result<SurfaceStatus, PresentError>;

    /// Flip the back surface to the screen
    fn show(&mut self) -> Result<SurfaceStatus, PresentError>;
}

/// Result of [`present`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Frame reached the screen after `retries` lost-content retries
    Shown { retries: u32 },
    /// Attempt budget ran out; the frame was dropped
    Dropped,
}

/// Present one frame: blit, re-blit while the back surface reports lost
/// contents, then flip; a lost flip restarts the whole sequence. At most
/// [`MAX_PRESENT_ATTEMPTS`] blit/flip calls are made.
pub fn present(
    strategy: &mut dyn BufferStrategy,
    frame: &PixelBuffer,
    hint: QualityHint,
) -> Result<PresentOutcome, PresentError> {
    let mut attempts = 0;
    let mut retries = 0;

    while attempts < MAX_PRESENT_ATTEMPTS {
        attempts += 1;
        if strategy.blit(frame, hint)? == SurfaceStatus::ContentsLost {
            retries += 1;
            continue;
        }

        if attempts == MAX_PRESENT_ATTEMPTS {
            break;
        }
        attempts += 1;
        match strategy.show()? {
            SurfaceStatus::Ok => return Ok(PresentOutcome::Shown { retries }),
            SurfaceStatus::ContentsLost => retries += 1,
        }
    }

    Ok(PresentOutcome::Dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Strategy replaying scripted statuses; missing entries mean `Ok`
    #[derive(Default)]
    struct Scripted {
        blits: VecDeque<SurfaceStatus>,
        shows: VecDeque<SurfaceStatus>,
        calls: Vec<&'static str>,
    }

    impl BufferStrategy for Scripted {
        fn blit(&mut self, _: &PixelBuffer, _: QualityHint) -> Result<SurfaceStatus, PresentError> {
            self.calls.push("blit");
            Ok(self.blits.pop_front().unwrap_or(SurfaceStatus::Ok))
        }

        fn show(&mut self) -> Result<SurfaceStatus, PresentError> {
            self.calls.push("show");
            Ok(self.shows.pop_front().unwrap_or(SurfaceStatus::Ok))
        }
    }

    fn frame() -> PixelBuffer {
        PixelBuffer::new(4, 4)
    }

    #[test]
    fn clean_present_is_blit_then_show() {
        let mut strategy = Scripted::default();
        let outcome = present(&mut strategy, &frame(), QualityHint::Mid).unwrap();
        assert_eq!(outcome, PresentOutcome::Shown { retries: 0 });
        assert_eq!(strategy.calls, vec!["blit", "show"]);
    }

    #[test]
    fn lost_blit_is_reblitted_before_show() {
        let mut strategy = Scripted {
            blits: VecDeque::from([SurfaceStatus::ContentsLost, SurfaceStatus::ContentsLost]),
            ..Default::default()
        };
        let outcome = present(&mut strategy, &frame(), QualityHint::Mid).unwrap();
        assert_eq!(outcome, PresentOutcome::Shown { retries: 2 });
        assert_eq!(strategy.calls, vec!["blit", "blit", "blit", "show"]);
    }

    #[test]
    fn lost_show_restarts_present() {
        let mut strategy = Scripted {
            shows: VecDeque::from([SurfaceStatus::ContentsLost]),
            ..Default::default()
        };
        let outcome = present(&mut strategy, &frame(), QualityHint::Mid).unwrap();
        assert_eq!(outcome, PresentOutcome::Shown { retries: 1 });
        assert_eq!(strategy.calls, vec!["blit", "show", "blit", "show"]);
    }

    #[test]
    fn permanently_lost_surface_is_bounded() {
        let mut strategy = Scripted {
            blits: VecDeque::from(vec![SurfaceStatus::ContentsLost; 100]),
            ..Default::default()
        };
        let outcome = present(&mut strategy, &frame(), QualityHint::Mid).unwrap();
        assert_eq!(outcome, PresentOutcome::Dropped);
        assert_eq!(strategy.calls.len(), MAX_PRESENT_ATTEMPTS as usize);
    }

    #[test]
    fn flapping_show_is_bounded() {
        let mut strategy = Scripted {
            shows: VecDeque::from(vec![SurfaceStatus::ContentsLost; 100]),
            ..Default::default()
        };
        let outcome = present(&mut strategy, &frame(), QualityHint::Mid).unwrap();
        assert_eq!(outcome, PresentOutcome::Dropped);
        assert_eq!(strategy.calls.len(), MAX_PRESENT_ATTEMPTS as usize);
    }

    #[test]
    fn fatal_errors_propagate() {
        struct Broken;
        impl BufferStrategy for Broken {
            fn blit(&mut self, _: &PixelBuffer, _: QualityHint) -> Result<SurfaceStatus, PresentError> {
                Err(PresentError::OutOfMemory)
            }
            fn show(&mut self) -> Result<SurfaceStatus, PresentError> {
                Ok(SurfaceStatus::Ok)
            }
        }
        assert!(matches!(
            present(&mut Broken, &frame(), QualityHint::Low),
            Err(PresentError::OutOfMemory)
        ));
    }

    #[test]
    fn hint_parsing() {
        assert_eq!("low".parse::<QualityHint>(), Ok(QualityHint::Low));
        assert_eq!("HIGHEST".parse::<QualityHint>(), Ok(QualityHint::Highest));
        assert!("ultra".parse::<QualityHint>().is_err());
        assert_eq!(QualityHint::default(), QualityHint::Mid);
        assert_eq!(QualityHint::High.to_string(), "high");
    }

    #[test]
    fn hint_serde_is_lowercase() {
        let json = serde_json::to_string(&QualityHint::Highest).unwrap();
        assert_eq!(json, "\"highest\"");
        let hint: QualityHint = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(hint, QualityHint::Low);
    }
}
