use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use docpane_core::{Command, RenderParameters};

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Command(Command),
    OpenResults,
    CloseOverlay,
    ResultsMoveSelection { delta: isize },
    ResultsActivateSelection,
    BeginSearch,
    SearchQueryChanged { query: String },
    SearchSubmit { query: String },
    SearchCancel,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Results,
    Search,
}

/// Turns key presses into [`UiEvent`]s, keeping a numeric count prefix and
/// the search prompt between events.
#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<u32>,
    pending_digits: String,
    mode: InputMode,
    search_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
            if matches!(self.mode, InputMode::Search) {
                self.search_buffer.clear();
            }
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match self.mode {
            InputMode::Normal => self.map_event_normal(event),
            InputMode::Results => self.map_event_results(event),
            InputMode::Search => self.map_event_search(event),
        }
    }

    fn map_event_normal(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit);
                }
                UiEvent::None
            }
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Down, KeyModifiers::NONE)
            | (KeyCode::Char(' '), KeyModifiers::NONE)
            | (KeyCode::PageDown, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::NextUnit { count })
            }
            (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Up, KeyModifiers::NONE)
            | (KeyCode::PageUp, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::PrevUnit { count })
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                let unit = self.pending_count.take().unwrap_or(1);
                self.reset_count();
                UiEvent::Command(Command::GotoUnit { unit })
            }
            (KeyCode::Char('G'), modifiers)
                if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
            {
                let unit = self.pending_count.take().unwrap_or(u32::MAX);
                self.reset_count();
                UiEvent::Command(Command::GotoUnit { unit })
            }
            (KeyCode::End, _) => {
                self.reset_count();
                UiEvent::Command(Command::GotoUnit { unit: u32::MAX })
            }
            (KeyCode::Char('+'), _) => {
                let count = self.take_count();
                UiEvent::Command(Command::ZoomBy {
                    delta: RenderParameters::ZOOM_STEP * count as f32,
                })
            }
            (KeyCode::Char('-'), _) => {
                let count = self.take_count();
                UiEvent::Command(Command::ZoomBy {
                    delta: -RenderParameters::ZOOM_STEP * count as f32,
                })
            }
            (KeyCode::Char('='), _) => {
                self.reset_count();
                UiEvent::Command(Command::ResetZoom)
            }
            (KeyCode::Char('c'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::CycleQuality)
            }
            (KeyCode::Char('v'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::CycleViewMode)
            }
            (KeyCode::Char('/'), KeyModifiers::NONE) => {
                self.set_mode(InputMode::Search);
                UiEvent::BeginSearch
            }
            (KeyCode::Char('n'), KeyModifiers::NONE) => {
                let count = self.take_count();
                UiEvent::Command(Command::SearchNext { count })
            }
            (KeyCode::Char('N'), modifiers)
                if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
            {
                let count = self.take_count();
                UiEvent::Command(Command::SearchPrev { count })
            }
            (KeyCode::Char('s'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::OpenResults
            }
            (KeyCode::Char('y'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::SelectUnitText)
            }
            (KeyCode::Char('r'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::Retry)
            }
            (KeyCode::Esc, _) => {
                self.reset_count();
                UiEvent::Command(Command::DismissError)
            }
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            (KeyCode::Char('c'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_event_results(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) | (KeyCode::Char('s'), _) => UiEvent::CloseOverlay,
                (KeyCode::Enter, _) => UiEvent::ResultsActivateSelection,
                (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                    UiEvent::ResultsMoveSelection { delta: 1 }
                }
                (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                    UiEvent::ResultsMoveSelection { delta: -1 }
                }
                (KeyCode::Char('q'), _) => UiEvent::Quit,
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn map_event_search(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match (code, modifiers) {
                (KeyCode::Esc, _) => {
                    self.set_mode(InputMode::Normal);
                    UiEvent::SearchCancel
                }
                (KeyCode::Enter, _) => {
                    let query = std::mem::take(&mut self.search_buffer);
                    self.set_mode(InputMode::Normal);
                    UiEvent::SearchSubmit { query }
                }
                (KeyCode::Backspace, _) => {
                    self.search_buffer.pop();
                    UiEvent::SearchQueryChanged {
                        query: self.search_buffer.clone(),
                    }
                }
                (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                    self.search_buffer.push(c);
                    UiEvent::SearchQueryChanged {
                        query: self.search_buffer.clone(),
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: u32) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> u32 {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    /// Partial input to echo on the status line.
    pub fn pending_input(&self) -> Option<String> {
        if matches!(self.mode, InputMode::Search) {
            return Some(format!("/{}", self.search_buffer));
        }
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}
