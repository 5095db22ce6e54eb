//! Lights and the light/dark theme

use bevy::prelude::*;
use tracing::debug;

use crate::camera::MainCamera;

/// Scene colour scheme. Switches background and light intensities.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn background(self) -> Color {
        match self {
            Theme::Light => Color::WHITE,
            Theme::Dark => Color::BLACK,
        }
    }

    /// Ambient intensity on the 0-1 scale the light rig is authored in
    pub fn ambient(self) -> f32 {
        match self {
            Theme::Light => 0.5,
            Theme::Dark => 0.3,
        }
    }
}

/// Ambient brightness per unit of authored intensity
const AMBIENT_SCALE: f32 = 400.0;
/// Directional illuminance (lux) per unit of authored intensity
const DIRECTIONAL_SCALE: f32 = 6000.0;

/// A directional light with per-theme intensity
#[derive(Component, Debug, Clone, Copy)]
pub struct ThemedLight {
    pub light: f32,
    pub dark: f32,
}

impl ThemedLight {
    pub fn intensity(&self, theme: Theme) -> f32 {
        match theme {
            Theme::Light => self.light,
            Theme::Dark => self.dark,
        }
    }
}

/// Key, fill and under lights: position and (light, dark) intensity
const RIG: [(Vec3, f32, f32); 3] = [
    (Vec3::new(5.0, 10.0, 7.0), 0.8, 0.5),
    (Vec3::new(-5.0, 5.0, -5.0), 0.5, 0.3),
    (Vec3::new(0.0, -10.0, 0.0), 0.3, 0.2),
];

pub struct LightsPlugin;

impl Plugin for LightsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Theme>()
            .insert_resource(ClearColor(Theme::default().background()))
            .add_systems(Startup, spawn_lights)
            .add_systems(Update, apply_theme);
    }
}

fn spawn_lights(mut commands: Commands, theme: Res<Theme>) {
    for (position, light, dark) in RIG {
        let themed = ThemedLight { light, dark };
        // The under light points straight up; pick an up vector not parallel to it
        let up = if position.x == 0.0 && position.z == 0.0 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        commands.spawn((
            DirectionalLight {
                illuminance: themed.intensity(*theme) * DIRECTIONAL_SCALE,
                shadows_enabled: false,
                ..default()
            },
            Transform::from_translation(position).looking_at(Vec3::ZERO, up),
            themed,
        ));
    }
}

fn apply_theme(
    theme: Res<Theme>,
    mut clear_color: ResMut<ClearColor>,
    mut ambient: Query<&mut AmbientLight, With<MainCamera>>,
    mut lights: Query<(&ThemedLight, &mut DirectionalLight)>,
) {
    if !theme.is_changed() {
        return;
    }
    clear_color.0 = theme.background();
    for mut light in &mut ambient {
        light.color = Color::WHITE;
        light.brightness = theme.ambient() * AMBIENT_SCALE;
    }
    for (themed, mut light) in &mut lights {
        light.illuminance = themed.intensity(*theme) * DIRECTIONAL_SCALE;
    }
    debug!(theme = ?*theme, "Theme applied");
}
