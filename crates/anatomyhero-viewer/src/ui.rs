//! UI overlays using bevy_egui

use std::time::Duration;

use anatomyhero_core::search::{match_ranges, SearchCursor};
use anatomyhero_core::throttle::Debounce;
use anatomyhero_core::{DescriptionPanel, InteractionMode, SearchEntry, Viewer};
use anatomyhero_scene::{Theme, ViewerState};
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};

use crate::browser;

const ERROR_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 100, 100);
const HIGHLIGHT: egui::Color32 = egui::Color32::from_rgb(51, 153, 255);

/// Screen-size dependent layout
#[derive(Resource, Debug, Clone)]
pub struct UiLayout {
    pub screen_width: f32,
    pub screen_height: f32,
    pub is_mobile: bool,
    /// Controls panel open (always shown on desktop)
    pub show_panel: bool,
}

impl Default for UiLayout {
    fn default() -> Self {
        Self {
            screen_width: 1280.0,
            screen_height: 720.0,
            is_mobile: false,
            show_panel: true,
        }
    }
}

impl UiLayout {
    pub fn update_for_screen(&mut self, width: f32, height: f32) {
        self.screen_width = width;
        self.screen_height = height;

        let was_mobile = self.is_mobile;
        self.is_mobile = width < 800.0 || (width < height && width < 600.0);

        // Start collapsed the first time a small screen is seen
        if self.is_mobile && !was_mobile {
            self.show_panel = false;
        }
    }

    pub fn panel_width(&self) -> f32 {
        if self.is_mobile {
            (self.screen_width * 0.6).min(260.0)
        } else {
            280.0
        }
    }
}

/// Text entered in the annotation dialog
#[derive(Debug, Clone, Default)]
pub struct AnnotationDialog {
    pub title: String,
    pub description: String,
}

/// Widget state that does not belong in the core viewer
#[derive(Resource)]
pub struct UiState {
    pub show_interface: bool,
    pub search_query: String,
    search_debounce: Debounce<String>,
    pub search_results: Vec<SearchEntry>,
    /// Query the current results were computed for
    pub searched: String,
    pub search_cursor: SearchCursor,
    pub dialog: Option<AnnotationDialog>,
    /// Annotation id awaiting delete confirmation
    pub confirm_delete: Option<String>,
}

impl UiState {
    pub fn new(search_debounce: Duration) -> Self {
        Self {
            show_interface: true,
            search_query: String::new(),
            search_debounce: Debounce::new(search_debounce),
            search_results: Vec::new(),
            searched: String::new(),
            search_cursor: SearchCursor::default(),
            dialog: None,
            confirm_delete: None,
        }
    }

    pub fn open_annotation_dialog(&mut self) {
        if self.dialog.is_none() {
            self.dialog = Some(AnnotationDialog::default());
        }
    }

    fn clear_search(&mut self) {
        self.search_query.clear();
        self.searched.clear();
        self.search_results.clear();
        self.search_cursor.reset();
        self.search_debounce.cancel();
    }
}

impl FromWorld for UiState {
    fn from_world(world: &mut World) -> Self {
        let delay = world
            .get_resource::<ViewerState>()
            .map(|state| state.config().interaction.search_debounce())
            .unwrap_or(Duration::from_millis(300));
        Self::new(delay)
    }
}

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UiLayout>()
            .init_resource::<UiState>()
            .add_systems(Update, (update_ui_layout, run_debounced_search))
            .add_systems(EguiPrimaryContextPass, ui_system);
    }
}

fn update_ui_layout(windows: Query<&Window, With<PrimaryWindow>>, mut layout: ResMut<UiLayout>) {
    if let Ok(window) = windows.single() {
        let (width, height) = (window.width(), window.height());
        if (layout.screen_width - width).abs() > 1.0 || (layout.screen_height - height).abs() > 1.0
        {
            layout.update_for_screen(width, height);
        }
    }
}

/// Run the search once typing has paused for the debounce delay
fn run_debounced_search(mut ui: ResMut<UiState>, state: Res<ViewerState>, time: Res<Time>) {
    if !ui.search_debounce.is_pending() {
        return;
    }
    if let Some(query) = ui.search_debounce.poll(time.elapsed()) {
        ui.search_results = state.search(&query);
        ui.searched = query;
        ui.search_cursor.reset();
    }
}

#[derive(SystemParam)]
pub struct UiParams<'w, 's> {
    contexts: EguiContexts<'w, 's>,
    state: ResMut<'w, ViewerState>,
    ui: ResMut<'w, UiState>,
    layout: ResMut<'w, UiLayout>,
    theme: ResMut<'w, Theme>,
    windows: Query<'w, 's, &'static mut Window, With<PrimaryWindow>>,
    time: Res<'w, Time>,
    commands: Commands<'w, 's>,
}

fn ui_system(mut params: UiParams) {
    let Ok(ctx) = params.contexts.ctx_mut() else {
        return;
    };
    let ctx = ctx.clone();

    if params.layout.is_mobile {
        let mut style = (*ctx.style()).clone();
        style.spacing.button_padding = egui::vec2(6.0, 4.0);
        style.spacing.item_spacing = egui::vec2(4.0, 3.0);
        ctx.set_style(style);
    }

    draw_overlays(&ctx, &params.state);

    if !params.ui.show_interface {
        egui::Area::new(egui::Id::new("show_interface"))
            .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
            .show(&ctx, |ui| {
                if ui.button("Show interface").clicked() {
                    params.ui.show_interface = true;
                }
            });
        return;
    }

    if params.layout.is_mobile && !params.layout.show_panel {
        egui::TopBottomPanel::bottom("mobile_toolbar").show(&ctx, |ui| {
            if ui.button("☰ Menu").clicked() {
                params.layout.show_panel = true;
            }
        });
    }

    if !params.layout.is_mobile || params.layout.show_panel {
        controls_panel(&ctx, &mut params);
    }
    description_panel(&ctx, &mut params);
    annotation_dialog(&ctx, &mut params);
    delete_confirmation(&ctx, &mut params);
}

fn controls_panel(ctx: &egui::Context, p: &mut UiParams) {
    let width = p.layout.panel_width();
    let is_mobile = p.layout.is_mobile;
    egui::SidePanel::left("controls_panel")
        .default_width(width)
        .resizable(!is_mobile)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("AnatomyHero");
                if is_mobile {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("✕").clicked() {
                            p.layout.show_panel = false;
                        }
                    });
                }
            });
            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| {
                search_section(ui, p);
                ui.separator();
                loading_section(ui, &p.state);
                systems_section(ui, p);
                ui.separator();
                view_options(ui, p);
                ui.separator();
                control_buttons(ui, p);
                ui.separator();
                annotation_list(ui, p);
            });
        });
}

fn search_section(ui: &mut egui::Ui, p: &mut UiParams) {
    let response = ui.add(
        egui::TextEdit::singleline(&mut p.ui.search_query)
            .hint_text("Search parts…")
            .desired_width(f32::INFINITY),
    );
    if response.changed() {
        let query = p.ui.search_query.clone();
        p.ui.search_debounce.push(query, p.time.elapsed());
    }

    let len = p.ui.search_results.len();
    let mut chosen = None;
    if response.has_focus() || response.lost_focus() {
        let (down, up, enter, escape) = ui.input(|i| {
            (
                i.key_pressed(egui::Key::ArrowDown),
                i.key_pressed(egui::Key::ArrowUp),
                i.key_pressed(egui::Key::Enter),
                i.key_pressed(egui::Key::Escape),
            )
        });
        if down {
            p.ui.search_cursor.down(len);
        }
        if up {
            p.ui.search_cursor.up(len);
        }
        if enter {
            chosen = p.ui.search_cursor.enter(len);
        }
        if escape {
            p.ui.clear_search();
            return;
        }
    }

    if len == 0 {
        if !p.ui.searched.trim().is_empty() {
            ui.label(egui::RichText::new("No matching parts").color(egui::Color32::GRAY));
        }
    } else {
        let focus = p.ui.search_cursor.focus();
        for (i, entry) in p.ui.search_results.iter().enumerate() {
            let job = highlighted(entry, &p.ui.searched, ui.visuals());
            let button = egui::Button::new(job).selected(focus == Some(i));
            if ui.add_sized([ui.available_width(), 20.0], button).clicked() {
                chosen = Some(i);
            }
        }
    }

    if let Some(part) = chosen.and_then(|i| p.ui.search_results.get(i)).map(|e| e.part) {
        p.state.select_part(part);
        p.ui.clear_search();
    }
}

/// Icon, name with matches emphasised, then the category
fn highlighted(entry: &SearchEntry, query: &str, visuals: &egui::Visuals) -> egui::text::LayoutJob {
    let mut job = egui::text::LayoutJob::default();
    let normal = egui::TextFormat {
        color: visuals.text_color(),
        ..Default::default()
    };
    let strong = egui::TextFormat {
        color: visuals.strong_text_color(),
        background: visuals.selection.bg_fill,
        ..Default::default()
    };

    job.append(&format!("{} ", entry.icon.glyph()), 0.0, normal.clone());
    let name = entry.name.as_str();
    let mut last = 0;
    for range in match_ranges(name, query) {
        job.append(&name[last..range.start], 0.0, normal.clone());
        job.append(&name[range.clone()], 0.0, strong.clone());
        last = range.end;
    }
    job.append(&name[last..], 0.0, normal);
    job.append(
        &format!("  {}", entry.category),
        0.0,
        egui::TextFormat {
            color: egui::Color32::GRAY,
            ..Default::default()
        },
    );
    job
}

fn loading_section(ui: &mut egui::Ui, viewer: &Viewer) {
    let progress = viewer.progress();
    if !progress.is_finished() {
        let percent = progress.percent();
        ui.add(
            egui::ProgressBar::new(f32::from(percent) / 100.0)
                .text(format!("Loading models… {percent}%")),
        );
    }
    for (system, reason) in progress.failures() {
        ui.label(egui::RichText::new(format!("Failed to load {system}: {reason}")).color(ERROR_COLOR));
    }
}

/// One checkbox per system. Checking one shows only that system.
fn systems_section(ui: &mut egui::Ui, p: &mut UiParams) {
    ui.label(egui::RichText::new("Systems").strong());
    let systems: Vec<(String, String)> = p
        .state
        .config()
        .systems
        .iter()
        .map(|s| (s.id.clone(), s.label()))
        .collect();

    for (id, label) in systems {
        let loaded = p.state.registry().system_parts(&id).next().is_some();
        let mut checked = p.state.is_system_visible(&id);
        let response = ui.add_enabled(loaded, egui::Checkbox::new(&mut checked, label));
        if response.changed() {
            if checked {
                p.state.show_only_system(&id);
            } else {
                p.state.set_system_visible(&id, false);
            }
        }
    }
}

fn view_options(ui: &mut egui::Ui, p: &mut UiParams) {
    let mode = p.state.mode();
    ui.horizontal_wrapped(|ui| {
        let annotate = egui::Button::new("✏ Annotate").selected(mode == InteractionMode::Annotate);
        if ui.add(annotate).clicked() {
            p.state.toggle_annotate();
        }
        let fade = egui::Button::new("◐ Fade").selected(p.state.fade_active());
        if ui.add(fade).clicked() {
            p.state.toggle_fade();
        }
        let isolate = egui::Button::new("⬚ Isolate").selected(mode == InteractionMode::Isolate);
        if ui.add(isolate).clicked() {
            p.state.toggle_isolate();
        }
    });

    let hint = match p.state.mode() {
        InteractionMode::Normal => None,
        InteractionMode::Annotate => Some("Click a surface to place a note"),
        InteractionMode::Isolate => Some("Drag a rectangle around the parts to isolate"),
    };
    if let Some(hint) = hint {
        ui.label(egui::RichText::new(hint).small().color(egui::Color32::GRAY));
    }
}

fn control_buttons(ui: &mut egui::Ui, p: &mut UiParams) {
    ui.horizontal_wrapped(|ui| {
        if ui.button("Reset view").clicked() {
            p.state.reset_view();
            p.ui.clear_search();
        }
        if ui.button("Fullscreen").clicked() {
            if let Ok(mut window) = p.windows.single_mut() {
                browser::toggle_fullscreen(&mut window);
            }
        }
        if ui.button("Screenshot").clicked() {
            browser::take_screenshot(&mut p.commands);
        }
        let theme_label = match *p.theme {
            Theme::Light => "Dark theme",
            Theme::Dark => "Light theme",
        };
        if ui.button(theme_label).clicked() {
            let next = p.theme.toggled();
            *p.theme = next;
        }
        if ui.button("Hide interface").clicked() {
            p.ui.show_interface = false;
        }
    });
}

fn annotation_list(ui: &mut egui::Ui, p: &mut UiParams) {
    let items: Vec<(String, String, String)> = p
        .state
        .annotations()
        .iter()
        .map(|a| (a.id.clone(), a.title.clone(), a.description.clone()))
        .collect();

    egui::CollapsingHeader::new(format!("Annotations ({})", items.len()))
        .default_open(true)
        .show(ui, |ui| {
            if items.is_empty() {
                ui.label(egui::RichText::new("No annotations yet").color(egui::Color32::GRAY));
            }
            for (id, title, description) in items {
                ui.horizontal(|ui| {
                    ui.label(&title).on_hover_text(&description);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("🗑").clicked() {
                            p.ui.confirm_delete = Some(id.clone());
                        }
                    });
                });
            }
        });
}

fn description_panel(ctx: &egui::Context, p: &mut UiParams) {
    let panel = p.state.description_panel().clone();
    if !panel.is_open() {
        return;
    }
    let width = p.layout.panel_width();
    egui::SidePanel::right("description_panel")
        .default_width(width)
        .show(ctx, |ui| {
            let mut close = false;
            ui.horizontal(|ui| {
                let title = match &panel {
                    DescriptionPanel::Loading { name } => name.as_str(),
                    DescriptionPanel::Shown(description) => description.title.as_str(),
                    DescriptionPanel::Closed => "",
                };
                ui.heading(title);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    close = ui.button("✕").clicked();
                });
            });
            ui.separator();
            match &panel {
                DescriptionPanel::Loading { .. } => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading description…");
                    });
                }
                DescriptionPanel::Shown(description) => {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        ui.label(&description.info);
                    });
                }
                DescriptionPanel::Closed => {}
            }
            if close {
                p.state.close_description();
            }
        });
}

fn annotation_dialog(ctx: &egui::Context, p: &mut UiParams) {
    if p.state.pending_annotation().is_none() {
        p.ui.dialog = None;
        return;
    }
    let Some(dialog) = p.ui.dialog.as_mut() else {
        return;
    };

    let mut save = false;
    let mut cancel = false;
    egui::Window::new("New annotation")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label("Title");
            ui.text_edit_singleline(&mut dialog.title);
            ui.label("Description");
            ui.text_edit_multiline(&mut dialog.description);
            let ready = !dialog.title.trim().is_empty() && !dialog.description.trim().is_empty();
            ui.horizontal(|ui| {
                save = ui.add_enabled(ready, egui::Button::new("Save")).clicked();
                cancel = ui.button("Cancel").clicked();
            });
        });

    if save {
        let (title, description) = (dialog.title.clone(), dialog.description.clone());
        if p.state.save_annotation(&title, &description).is_some() {
            p.ui.dialog = None;
        }
    } else if cancel {
        p.state.cancel_annotation();
        p.ui.dialog = None;
    }
}

fn delete_confirmation(ctx: &egui::Context, p: &mut UiParams) {
    let Some(id) = p.ui.confirm_delete.clone() else {
        return;
    };
    let title = p
        .state
        .annotations()
        .get(&id)
        .map(|a| a.title.clone())
        .unwrap_or_default();

    egui::Window::new("Delete annotation?")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(format!("Delete \"{title}\"? This cannot be undone."));
            ui.horizontal(|ui| {
                if ui.button("Delete").clicked() {
                    p.state.delete_annotation(&id);
                    p.ui.confirm_delete = None;
                }
                if ui.button("Cancel").clicked() {
                    p.ui.confirm_delete = None;
                }
            });
        });
}

/// Isolate rectangle and projected annotation labels, drawn over the scene
fn draw_overlays(ctx: &egui::Context, viewer: &Viewer) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Background,
        egui::Id::new("scene_overlay"),
    ));

    if let Some((min, max)) = viewer.drag_rect() {
        let rect = egui::Rect::from_min_max(egui::pos2(min.x, min.y), egui::pos2(max.x, max.y));
        painter.rect_filled(rect, 0.0, HIGHLIGHT.gamma_multiply(0.15));
        painter.rect_stroke(
            rect,
            0.0,
            egui::Stroke::new(1.5, HIGHLIGHT),
            egui::StrokeKind::Middle,
        );
    }

    let text_color = ctx.style().visuals.strong_text_color();
    for label in viewer.annotation_labels() {
        let at = egui::pos2(label.pixel.x, label.pixel.y);
        painter.circle_filled(at, 4.0, ERROR_COLOR);
        painter.text(
            at + egui::vec2(8.0, -6.0),
            egui::Align2::LEFT_BOTTOM,
            &label.title,
            egui::FontId::proportional(13.0),
            text_color,
        );
    }
}
