//! bonnie-raster demo
//!
//! A spinning mipmapped cube inside a ring of alpha-blended sparks, drawn
//! entirely in software and blitted to a macroquad window.
//!
//! Keys: arrows orbit, F toggles fog, M toggles mipmapping, A cycles the
//! span filler arithmetic, P saves a PNG screenshot.

use bonnie_raster::config::{Arithmetic, RenderConfig, CONFIG_FILE};
use bonnie_raster::rasterizer::{
    Billboard, BillboardSet, Camera, Color as RasterColor, Mesh, Rasterizer, RenderFlags,
    Renderer, Texture, TextureBank, TextureError, TriangleList, Vec3,
};
use macroquad::prelude::*;

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const ORBIT_DISTANCE: f32 = 4.0;
const SPARK_COUNT: usize = 8;
const SPARK_FRAME_TIME: f32 = 0.1;

fn window_conf() -> Conf {
    Conf {
        window_title: format!("bonnie-raster v{}", VERSION),
        window_width: 960,
        window_height: 720,
        window_resizable: true,
        ..Default::default()
    }
}

fn load_config() -> RenderConfig {
    if !std::path::Path::new(CONFIG_FILE).exists() {
        return RenderConfig::default();
    }
    match RenderConfig::load(CONFIG_FILE) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{}: {}, using defaults", CONFIG_FILE, e);
            RenderConfig::default()
        }
    }
}

/// Soft round spark: alpha falls off from the centre
fn spark(tint: RasterColor) -> Result<Texture, TextureError> {
    const SIZE: usize = 16;
    let mut pixels = Vec::with_capacity(SIZE * SIZE);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let dx = x as f32 + 0.5 - SIZE as f32 * 0.5;
            let dy = y as f32 + 0.5 - SIZE as f32 * 0.5;
            let d = (dx * dx + dy * dy).sqrt() / (SIZE as f32 * 0.5);
            let a = ((1.0 - d).clamp(0.0, 1.0) * 255.0) as u8;
            pixels.push(RasterColor::with_alpha(tint.r, tint.g, tint.b, a));
        }
    }
    Texture::from_pixels("spark", SIZE, SIZE, pixels)
}

fn next_arithmetic(current: Arithmetic) -> Arithmetic {
    match current {
        Arithmetic::Float => Arithmetic::FloatWide,
        Arithmetic::FloatWide => Arithmetic::Fixed,
        Arithmetic::Fixed => Arithmetic::Float,
    }
}

fn build_textures() -> Result<(TextureBank, usize, usize, usize), TextureError> {
    let mut bank = TextureBank::new();
    let crate_tex = Texture::checkerboard(
        64,
        64,
        8,
        RasterColor::new(200, 160, 90),
        RasterColor::new(90, 60, 40),
    )?
    .with_mipmaps();
    let crate_slot = bank.insert(crate_tex);
    let spark_slot = bank.insert(spark(RasterColor::new(255, 220, 120))?);
    let flicker_slot = bank.insert_animated(vec![
        spark(RasterColor::new(255, 120, 40))?,
        spark(RasterColor::new(255, 200, 80))?,
        spark(RasterColor::new(255, 255, 200))?,
    ])?;
    Ok((bank, crate_slot, spark_slot, flicker_slot))
}

fn blit(raster: &Rasterizer) {
    let fb = raster.framebuffer();
    let texture = Texture2D::from_rgba8(fb.width as u16, fb.height as u16, &fb.pixels);
    texture.set_filter(FilterMode::Nearest);

    // Largest aspect-preserving fit in the window
    let scale = (screen_width() / fb.width as f32).min(screen_height() / fb.height as f32);
    let draw_w = fb.width as f32 * scale;
    let draw_h = fb.height as f32 * scale;
    draw_texture_ex(
        &texture,
        (screen_width() - draw_w) * 0.5,
        (screen_height() - draw_h) * 0.5,
        WHITE,
        DrawTextureParams {
            dest_size: Some(vec2(draw_w, draw_h)),
            ..Default::default()
        },
    );
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    let config = load_config();
    if let Err(e) = config.validate() {
        log::error!("invalid config: {}", e);
        return;
    }
    let (mut bank, crate_slot, spark_slot, flicker_slot) = match build_textures() {
        Ok(t) => t,
        Err(e) => {
            log::error!("texture setup failed: {}", e);
            return;
        }
    };

    let mut renderer = Renderer::new(&config);
    let mut raster = Rasterizer::new(&config);
    let mut list = TriangleList::new(config.max_triangles);
    list.fog = config.fog;
    log::info!(
        "{}x{} fov {} filler {}",
        config.width,
        config.height,
        config.fov,
        raster.filler_name()
    );

    let mut cube = Mesh::cube(1.0, crate_slot);
    cube.flags = RenderFlags::TEXTURED | RenderFlags::MIPMAPPED | RenderFlags::FOGGED;

    let mut sparks = BillboardSet::new("sparks");
    sparks.flags = RenderFlags::TEXTURED | RenderFlags::FOGGED;
    for i in 0..SPARK_COUNT {
        let a = i as f32 / SPARK_COUNT as f32 * std::f32::consts::TAU;
        let slot = if i % 2 == 0 { spark_slot } else { flicker_slot };
        sparks.push(Billboard::new(Vec3::new(a.cos() * 2.0, 0.0, a.sin() * 2.0), 0.3, slot));
    }

    let mut camera = Camera::new();
    camera.rotate(20.0, 0.0);
    let mut fogged = true;
    let mut mipmapping = config.mipmapping;
    let mut arithmetic = config.arithmetic;
    raster.set_background(config.fog.color);
    let mut spark_timer = 0.0;

    loop {
        let dt = get_frame_time();

        if is_key_down(KeyCode::Left) {
            camera.rotate(0.0, 90.0 * dt);
        }
        if is_key_down(KeyCode::Right) {
            camera.rotate(0.0, -90.0 * dt);
        }
        if is_key_down(KeyCode::Up) {
            camera.rotate(60.0 * dt, 0.0);
        }
        if is_key_down(KeyCode::Down) {
            camera.rotate(-60.0 * dt, 0.0);
        }
        if is_key_pressed(KeyCode::F) {
            fogged = !fogged;
            cube.flags.set(RenderFlags::FOGGED, fogged);
            sparks.flags.set(RenderFlags::FOGGED, fogged);
            raster.set_background(if fogged { config.fog.color } else { config.background });
            log::info!("fog {}", if fogged { "on" } else { "off" });
        }
        if is_key_pressed(KeyCode::M) {
            mipmapping = !mipmapping;
            raster.set_mipmapping(mipmapping);
            log::info!("mipmapping {}", if mipmapping { "on" } else { "off" });
        }
        if is_key_pressed(KeyCode::A) {
            arithmetic = next_arithmetic(arithmetic);
            raster.set_arithmetic(arithmetic);
            log::info!("filler {}", raster.filler_name());
        }
        camera.position = -(camera.forward() * ORBIT_DISTANCE);

        spark_timer += dt;
        if spark_timer >= SPARK_FRAME_TIME {
            spark_timer -= SPARK_FRAME_TIME;
            bank.advance(flicker_slot);
        }

        cube.transform.angle.y += 40.0 * dt;
        cube.transform.angle.z += 15.0 * dt;
        cube.update_matrix();
        sparks.transform.angle.y -= 25.0 * dt;
        sparks.update_matrix();

        renderer.flush();
        list.clear();
        renderer.set_camera(&camera);
        for result in [
            renderer.render(&cube, &bank, &mut list),
            renderer.render(&sparks, &bank, &mut list),
        ] {
            if let Err(e) = result {
                log::warn!("render: {}", e);
            }
        }

        raster.flush();
        let raster_stats = raster.raster_list(&mut list, &bank);

        if is_key_pressed(KeyCode::P) {
            let path = format!("bonnie-raster-{}.png", (get_time() * 1000.0) as u64);
            match raster.framebuffer().save_png(&path) {
                Ok(()) => log::info!("saved {}", path),
                Err(e) => log::warn!("screenshot failed: {}", e),
            }
        }

        clear_background(BLACK);
        blit(&raster);
        let stats = renderer.stats();
        draw_text(
            &format!(
                "tris {} split {} culled {} drawn {} filler {}  [arrows] orbit  [F] fog  [M] mip  [A] filler  [P] png",
                stats.emitted,
                stats.split,
                stats.backfaced,
                raster_stats.drawn,
                raster.filler_name()
            ),
            8.0,
            20.0,
            20.0,
            WHITE,
        );

        next_frame().await
    }
}
