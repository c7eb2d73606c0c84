/// Terminal front-end: renders a page of model elements as ASCII art
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use std::cell::RefCell;
use std::io::{self, stdout, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use xmodel_core::css;
use xmodel_core::document::{MemoryDocument, MemoryElement};
use xmodel_core::{
    DomElement, ElementEvent, FileLoader, LoadRequest, LoadResult, ModelRegistry, ModelSlot, RenderLayer,
    RotationState, SceneNode, Transform, Viewport,
};

pub mod page;
pub mod renderer;

pub use page::Page;
pub use renderer::AsciiRenderer;

type Completions = Rc<RefCell<Vec<(usize, u64, LoadResult<SceneNode>)>>>;

struct Model {
    slot: ModelSlot<MemoryElement>,
    spin: Option<f32>,
    /// Where the element goes back when shown again
    parent: Option<MemoryElement>,
}

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    document: MemoryDocument,
    viewport: Viewport,
    layer: RenderLayer<MemoryElement, AsciiRenderer>,
    registry: ModelRegistry,
    models: Vec<Model>,
    pool: LocalPool,
    completions: Completions,
    rotation: RotationState,
    started: Instant,
    status: String,
    hidden: bool,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
    frame_time: Duration,
}

impl TerminalApp {
    pub fn new(page: Page, fps: u32) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(page, fps, width as usize, height as usize))
    }

    /// Build the app for a character grid of the given size.
    pub fn with_size(page: Page, fps: u32, width: usize, height: usize) -> Self {
        let (document, elements) = page.build();

        let mut registry = ModelRegistry::new();
        match &page.models {
            Some(base) => FileLoader::with_base(base),
            None => FileLoader::new(),
        }
        .register_all(&mut registry);

        let mut layer = RenderLayer::new(AsciiRenderer::new(width, height), page.layer.clone());
        if let Some((columns, rows)) = layer.initialize() {
            info!(columns, rows, "terminal surface ready");
        }

        let sources: Vec<String> = elements.iter().map(|model| model.src.clone()).collect();
        let models = elements
            .into_iter()
            .map(|model| Model {
                slot: ModelSlot::new(model.element.clone()),
                spin: model.spin,
                parent: None,
            })
            .collect();

        let mut app = Self {
            document,
            viewport: page.viewport.into(),
            layer,
            registry,
            models,
            pool: LocalPool::new(),
            completions: Rc::new(RefCell::new(Vec::new())),
            rotation: RotationState::zero(),
            started: Instant::now(),
            status: String::new(),
            hidden: false,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
            frame_time: Duration::from_millis(1000 / u64::from(fps.max(1))),
        };

        for (index, src) in sources.into_iter().enumerate() {
            app.set_source(index, Some(src));
        }
        app
    }

    pub fn layer(&self) -> &RenderLayer<MemoryElement, AsciiRenderer> {
        &self.layer
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Change the source of the model at `index`, starting its load.
    pub fn set_source(&mut self, index: usize, src: Option<String>) {
        let Some(model) = self.models.get_mut(index) else {
            return;
        };
        let Some(LoadRequest { locator, generation }) = model
            .slot
            .handle(ElementEvent::SourceChanged(src), &mut self.layer)
        else {
            return;
        };

        match self.registry.load(&locator) {
            Ok(pending) => {
                let completions = self.completions.clone();
                let spawned = self.pool.spawner().spawn_local(async move {
                    let result = pending.await;
                    completions.borrow_mut().push((index, generation, result));
                });
                if let Err(e) = spawned {
                    warn!(error = %e, "failed to schedule model load");
                }
            }
            Err(e) => {
                self.completions
                    .borrow_mut()
                    .push((index, generation, Err(e)));
            }
        }
    }

    /// Run pending loads as far as they go and hand results to their slots.
    pub fn poll_loads(&mut self) {
        self.pool.run_until_stalled();
        let completed: Vec<_> = self.completions.borrow_mut().drain(..).collect();
        for (index, generation, result) in completed {
            let Some(model) = self.models.get_mut(index) else {
                continue;
            };
            match model.slot.complete(generation, result, &mut self.layer) {
                Some(Ok(())) => {
                    self.status = format!("loaded {}", model.slot.source().unwrap_or_default());
                }
                Some(Err(e)) => {
                    self.status = e.to_string();
                }
                None => {}
            }
        }
    }

    /// Reload every model; served from the template cache.
    pub fn reload(&mut self) {
        let sources: Vec<Option<String>> = self
            .models
            .iter()
            .map(|m| m.slot.source().map(str::to_string))
            .collect();
        for (index, src) in sources.into_iter().enumerate() {
            self.set_source(index, src);
        }
    }

    /// Detach every model element from the document, or put them back.
    pub fn toggle_hidden(&mut self) {
        self.hidden = !self.hidden;
        for model in &mut self.models {
            let element = model.slot.element().clone();
            let event = if self.hidden {
                model.parent = element.parent_element();
                element.remove();
                ElementEvent::Disconnected
            } else {
                match model.parent.take() {
                    Some(parent) => parent.append_child(&element),
                    None => self.document.root().append_child(&element),
                }
                ElementEvent::Connected
            };
            model.slot.handle(event, &mut self.layer);
        }
    }

    /// Write the current animation state into the model elements' styles.
    pub fn animate(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f32();
        for model in &self.models {
            let Some(spin) = model.spin else {
                continue;
            };
            let mut rotation = self.rotation;
            rotation.rotate(0.0, (spin * seconds).to_radians(), 0.0);
            let matrix = Transform::rotation_matrix(&rotation);
            model.slot.element().set_transform(&css::format_matrix3d(&matrix));
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        while self.running {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::from_millis(0))? {
                self.handle_input()?;
            }

            self.poll_loads();
            self.animate(self.started.elapsed());
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < self.frame_time {
                std::thread::sleep(self.frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        match event::read()? {
            Event::Key(KeyEvent { code, .. }) => match code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.running = false;
                }
                KeyCode::Char('w') | KeyCode::Up => {
                    self.rotation.rotate(0.1, 0.0, 0.0);
                }
                KeyCode::Char('s') | KeyCode::Down => {
                    self.rotation.rotate(-0.1, 0.0, 0.0);
                }
                KeyCode::Char('a') | KeyCode::Left => {
                    self.rotation.rotate(0.0, -0.1, 0.0);
                }
                KeyCode::Char('d') | KeyCode::Right => {
                    self.rotation.rotate(0.0, 0.1, 0.0);
                }
                KeyCode::Char('e') => {
                    self.rotation.rotate(0.0, 0.0, 0.1);
                }
                KeyCode::Char('r') => {
                    self.rotation.rotate(0.0, 0.0, -0.1);
                }
                KeyCode::Char('l') => self.reload(),
                KeyCode::Char('h') => self.toggle_hidden(),
                _ => {}
            },
            Event::Resize(width, height) => {
                self.layer
                    .renderer_mut()
                    .resize(width as usize, height as usize);
            }
            _ => {}
        }
        Ok(())
    }

    fn render(&mut self) -> io::Result<()> {
        self.layer.update(self.viewport);

        // Output to terminal
        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;

        self.layer.renderer().draw(&mut stdout)?;

        // Draw UI overlay
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "xmodel | FPS: {:.1} | models: {} | WASD/Arrows=Rotate E/R=Roll L=Reload H=Hide Q=Quit | {}",
                self.fps,
                self.layer.len(),
                self.status
            )),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ViewportConfig;
    use nalgebra::Vector3;
    use std::path::Path;

    const CUBE: &str = "v -1 -1 -1\nv 1 -1 -1\nv 1 1 -1\nv -1 1 -1\n\
        v -1 -1 1\nv 1 -1 1\nv 1 1 1\nv -1 1 1\n\
        f 5 6 7 8\nf 1 4 3 2\nf 1 5 8 4\nf 2 3 7 6\nf 4 8 7 3\nf 1 2 6 5\n";

    fn app_with_cube() -> (tempfile::TempDir, TerminalApp) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cube.obj");
        std::fs::write(&path, CUBE).expect("write cube");
        let page = Page::single_model(&path, ViewportConfig::default());
        (dir, TerminalApp::with_size(page, 30, 80, 24))
    }

    #[test]
    fn test_model_loads_and_renders() {
        let (_dir, mut app) = app_with_cube();
        assert!(app.layer().is_empty());

        app.poll_loads();
        assert_eq!(app.layer().len(), 1);
        assert_eq!(app.status(), "loaded cube.obj");

        assert!(app.layer.update(app.viewport));
        assert_ne!(app.layer().renderer().char_at(40, 12), ' ');
    }

    #[test]
    fn test_missing_model_reports_error() {
        let page = Page::single_model(Path::new("/nonexistent/teapot.obj"), ViewportConfig::default());
        let mut app = TerminalApp::with_size(page, 30, 80, 24);
        app.poll_loads();
        assert!(app.layer().is_empty());
        assert!(app.status().contains("teapot.obj"));
    }

    #[test]
    fn test_unknown_format_reports_error() {
        let page = Page::single_model(Path::new("scene.gltf"), ViewportConfig::default());
        let mut app = TerminalApp::with_size(page, 30, 80, 24);
        app.poll_loads();
        assert!(app.status().contains("unknown object format"));
    }

    #[test]
    fn test_hide_and_reload() {
        let (_dir, mut app) = app_with_cube();
        app.poll_loads();

        app.toggle_hidden();
        assert!(app.layer().is_empty());
        assert!(!app.models[0].slot.element().is_connected());

        app.toggle_hidden();
        assert_eq!(app.layer().len(), 1);
        assert!(app.models[0].slot.element().is_connected());

        app.reload();
        assert!(app.layer().is_empty());
        app.poll_loads();
        assert_eq!(app.layer().len(), 1);
    }

    #[test]
    fn test_animation_writes_transform() {
        let (_dir, mut app) = app_with_cube();
        app.animate(Duration::from_secs(3));

        // 30 deg/s for 3 s: a quarter turn about the vertical axis
        let element = app.models[0].slot.element();
        let matrix = css::parse_transform_value(&element.computed_style().transform);
        let x_axis = matrix.transform_vector(&Vector3::new(1.0, 0.0, 0.0));
        assert!(x_axis.x.abs() < 1e-4);
        assert!((x_axis.z.abs() - 1.0).abs() < 1e-4);
    }
}
