/// Single-selection state over markers, keyed by backend id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Unselected,
    Selected {
        id: String,
    },
}

impl Selection {
    /// Marker activation: select, switch, or toggle off when `id` is already selected.
    pub fn activate(&mut self, id: &str) {
        *self = match &*self {
            Selection::Selected { id: current } if current.as_str() == id => Selection::Unselected,
            _ => Selection::Selected { id: id.to_string() },
        };
    }

    pub fn reset(&mut self) {
        *self = Selection::Unselected;
    }

    pub fn selected_id(&self) -> Option<&str> {
        match self {
            Selection::Unselected => None,
            Selection::Selected { id } => Some(id),
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_id() == Some(id)
    }

    /// Clears the selection unless `keep` still holds the selected id.
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnOnce(&str) -> bool,
    {
        if let Selection::Selected { id } = self {
            if !keep(id) {
                *self = Selection::Unselected;
            }
        }
    }
}
