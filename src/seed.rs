use tracing::info;

use crate::engine::{Engine, EngineError};

/// Demo surfaces and the courts built on each.
const DEMO_SURFACES: &[(&str, u32, &[&str])] = &[
    ("Clay", 10, &["Court 1", "Court 2"]),
    ("Grass", 15, &["Court 3", "Court 4"]),
];

/// Create the demo surfaces and courts unless any surface exists already.
/// Returns whether anything was created.
pub async fn seed_demo_data(engine: &Engine) -> Result<bool, EngineError> {
    if !engine.list_surfaces().is_empty() {
        info!("store already has surfaces, skipping demo data");
        return Ok(false);
    }
    for (name, minute_price, courts) in DEMO_SURFACES {
        let surface = engine.create_surface((*name).into(), *minute_price).await?;
        for court in *courts {
            engine.create_court((*court).into(), surface.id).await?;
        }
    }
    info!("seeded {} demo surfaces", DEMO_SURFACES.len());
    Ok(true)
}
