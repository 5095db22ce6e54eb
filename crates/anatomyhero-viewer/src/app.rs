//! Bevy application setup

use std::time::Duration;

use anatomyhero_core::ViewerConfig;
use anatomyhero_scene::{AnatomyScenePlugin, ViewerState};
use bevy::prelude::*;
use bevy::winit::WinitSettings;
use bevy_egui::EguiPlugin;
use bevy_picking::{prelude::MeshPickingPlugin, DefaultPickingPlugins};
use tracing::error;

use crate::describe::DescribePlugin;
use crate::storage::annotation_persistence;
use crate::ui::{UiLayout, UiPlugin};

/// Configuration shipped with the viewer
const DEFAULT_CONFIG: &str = include_str!("../anatomyhero.toml");

fn load_embedded_config() -> ViewerConfig {
    match ViewerConfig::from_toml_str(DEFAULT_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Embedded configuration invalid, using defaults");
            ViewerConfig::default()
        }
    }
}

/// Run the Bevy application
pub fn run() {
    let config = load_embedded_config();
    let persistence = annotation_persistence(&config.storage.annotations_key);

    App::new()
        .insert_resource(WinitSettings::default())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "AnatomyHero".to_string(),
                        canvas: Some("#viewer-canvas".to_string()),
                        fit_canvas_to_parent: true,
                        prevent_default_event_handling: false,
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    // Models are served next to the page
                    file_path: "".to_string(),
                    meta_check: bevy::asset::AssetMetaCheck::Never,
                    ..default()
                }),
        )
        // bevy_egui looks for the bevy_picking crate's PickingPlugin, so these
        // go in before EguiPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(MeshPickingPlugin)
        .add_plugins(EguiPlugin::default())
        .insert_resource(ViewerState::new(config.clone(), persistence))
        .add_plugins(AnatomyScenePlugin { config })
        .add_plugins(UiPlugin)
        .add_plugins(DescribePlugin)
        .add_systems(Update, adjust_power_settings_for_mobile)
        .run();
}

/// Reactive low-power rendering on small screens, continuous on desktop
fn adjust_power_settings_for_mobile(
    layout: Res<UiLayout>,
    mut winit_settings: ResMut<WinitSettings>,
) {
    if !layout.is_changed() {
        return;
    }

    if layout.is_mobile {
        use bevy::winit::UpdateMode;
        winit_settings.focused_mode = UpdateMode::reactive_low_power(Duration::from_millis(100));
        winit_settings.unfocused_mode = UpdateMode::reactive_low_power(Duration::from_millis(500));
    } else {
        *winit_settings = WinitSettings::default();
    }
}
