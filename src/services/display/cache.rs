use crate::events::{DisplayBounds, DisplayInfo, DisplaySelector};

/// Последний известный список мониторов
#[derive(Debug, Default)]
pub struct DisplayCache {
    displays: Vec<DisplayInfo>,
}

impl DisplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Заменить список; `true` если конфигурация мониторов изменилась
    pub fn update(&mut self, displays: Vec<DisplayInfo>) -> bool {
        if self.displays == displays {
            return false;
        }
        self.displays = displays;
        true
    }

    pub fn displays(&self) -> &[DisplayInfo] {
        &self.displays
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }

    /// Границы целевого дисплея с откатом на основной
    pub fn target_bounds(&self, selector: &DisplaySelector) -> Option<DisplayBounds> {
        selector.resolve(&self.displays).map(|display| display.bounds)
    }
}
