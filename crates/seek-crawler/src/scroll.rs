//! Scrolls a page until lazily loaded content stops growing it.

use std::time::Duration;

use crate::error::RenderError;
use crate::render::RenderSurface;

pub(crate) const SCROLL_HEIGHT_SCRIPT: &str = "document.documentElement.scrollHeight";
pub(crate) const SCROLL_TO_BOTTOM_SCRIPT: &str =
    "window.scrollTo(0, document.documentElement.scrollHeight)";

/// Scroll to the bottom repeatedly, waiting `delay` each time, until the
/// document height stops increasing or `max_rounds` is reached.
///
/// Returns the number of scroll rounds performed.
pub async fn scroll_to_bottom<S>(
    surface: &S,
    delay: Duration,
    max_rounds: u32,
) -> Result<u32, RenderError>
where
    S: RenderSurface + ?Sized,
{
    let mut last_height = document_height(surface).await?;
    let mut rounds = 0;

    while rounds < max_rounds {
        surface.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await?;
        tokio::time::sleep(delay).await;
        rounds += 1;

        let new_height = document_height(surface).await?;
        if new_height <= last_height {
            tracing::debug!(rounds, height = new_height, "Page height settled");
            return Ok(rounds);
        }
        last_height = new_height;
    }

    tracing::warn!(rounds, height = last_height, "Scroll cap reached before page settled");
    Ok(rounds)
}

async fn document_height<S>(surface: &S) -> Result<f64, RenderError>
where
    S: RenderSurface + ?Sized,
{
    let value = surface.evaluate(SCROLL_HEIGHT_SCRIPT).await?;
    value
        .as_f64()
        .ok_or_else(|| RenderError::Script(format!("scrollHeight was not a number: {value}")))
}
