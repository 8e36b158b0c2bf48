use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use bevy::window::{PrimaryWindow, WindowResized, WindowResolution};

use crate::simulation::animation::AnimationLoop;
use crate::simulation::scenario::Scenario;
use crate::simulation::states::NVec2;
use crate::visualization::canvas::{Canvas, BACKGROUND};

/// Raster, frame loop and the texture the raster is copied into
#[derive(Resource)]
struct Frame {
    canvas: Canvas,
    looping: AnimationLoop,
    image: Handle<Image>,
}

/// Tags the sprite showing the canvas texture
#[derive(Component)]
struct CanvasSprite;

pub fn run_2d(scenario: Scenario) {
    info!("run_2d: starting Bevy 2D viewer for {}", scenario.app.name());

    let (w, h) = (scenario.canvas.width as f32, scenario.canvas.height as f32);
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: scenario.app.name().to_string(),
                resolution: WindowResolution::new(w, h),
                ..Default::default()
            }),
            ..Default::default()
        }))
        .insert_resource(scenario)
        .add_systems(Startup, setup_canvas_system)
        .add_systems(Update, (resize_system, input_system, frame_system, upload_system).chain())
        .run();
}

fn setup_canvas_system(mut commands: Commands, scenario: Res<Scenario>, mut images: ResMut<Assets<Image>>) {
    commands.spawn(Camera2dBundle::default());

    let (width, height) = (scenario.canvas.width.max(1), scenario.canvas.height.max(1));
    let handle = images.add(canvas_image(width, height));

    commands.spawn((
        SpriteBundle {
            texture: handle.clone(),
            ..Default::default()
        },
        CanvasSprite,
    ));

    commands.insert_resource(Frame {
        canvas: Canvas::new(width, height, scenario.world),
        looping: AnimationLoop::new(scenario.parameters.dt),
        image: handle,
    });
}

fn canvas_image(width: usize, height: usize) -> Image {
    Image::new_fill(
        Extent3d {
            width: width as u32,
            height: height as u32,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &BACKGROUND,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::default(),
    )
}

/// Window resized: rebuild the raster, let the app react and swap the texture
fn resize_system(
    mut resized: EventReader<WindowResized>,
    mut scenario: ResMut<Scenario>,
    mut frame: ResMut<Frame>,
    mut images: ResMut<Assets<Image>>,
    mut sprites: Query<&mut Handle<Image>, With<CanvasSprite>>,
) {
    let Some((width, height)) = resized.read().last().map(|e| (e.width, e.height)) else {
        return;
    };
    let (width, height) = (width.round().max(1.0) as usize, height.round().max(1.0) as usize);
    if (width, height) == (frame.canvas.width, frame.canvas.height) {
        return;
    }

    let Frame { canvas, looping, image } = &mut *frame;
    looping.resize(&mut *scenario.app, canvas, width, height);
    let old = std::mem::replace(image, images.add(canvas_image(width, height)));
    images.remove(old.id());
    for mut texture in &mut sprites {
        *texture = image.clone();
    }
    info!(width, height, "canvas resized");
}

/// Space toggles play, R resets, the left button is forwarded to the app
fn input_system(
    keys: Res<ButtonInput<KeyCode>>,
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut scenario: ResMut<Scenario>,
    mut frame: ResMut<Frame>,
) {
    let Frame { canvas, looping, .. } = &mut *frame;
    let app = &mut *scenario.app;

    if keys.just_pressed(KeyCode::Space) {
        looping.toggle();
    }
    if keys.just_pressed(KeyCode::KeyR) {
        looping.reset(&mut *app);
    }

    let Ok(window) = windows.get_single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };
    // window pixels -> canvas pixels -> world
    let px = cursor.x as f64 * canvas.width as f64 / window.width().max(1.0) as f64;
    let py = cursor.y as f64 * canvas.height as f64 / window.height().max(1.0) as f64;
    let p: NVec2 = canvas.viewport.to_world(px, py);

    if buttons.just_pressed(MouseButton::Left) {
        app.pointer_down(p);
    } else if buttons.just_released(MouseButton::Left) {
        app.pointer_up(p);
    } else if buttons.pressed(MouseButton::Left) {
        app.pointer_move(p);
    }
}

fn frame_system(mut scenario: ResMut<Scenario>, mut frame: ResMut<Frame>, mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    let Frame { canvas, looping, .. } = &mut *frame;
    looping.tick(&mut *scenario.app, canvas);

    if let Ok(mut window) = windows.get_single_mut() {
        window.title = format!("{}  {}", scenario.app.name(), scenario.app.status());
    }
}

fn upload_system(frame: Res<Frame>, mut images: ResMut<Assets<Image>>) {
    if let Some(image) = images.get_mut(&frame.image) {
        if image.data.len() == frame.canvas.pixels().len() {
            image.data.copy_from_slice(frame.canvas.pixels());
        }
    }
}
