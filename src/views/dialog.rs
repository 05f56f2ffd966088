use super::callbacks::{CallbackRegistry, Handler};
use crate::xml::{create_node, Document, Element, NodeSpec};

pub const OPTION_DIALOG_ID: &str = "domview.optionDialog";

pub struct DialogOption {
    pub label: String,
    pub callback: Option<Handler>,
}

impl DialogOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback: None,
        }
    }

    pub fn on_select(mut self, callback: Handler) -> Self {
        self.callback = Some(callback);
        self
    }
}

/// A modal menu. Option `i` is wired to the `DialogOption_<i>` callback.
#[derive(Default)]
pub struct OptionDialog {
    pub title: String,
    pub description: String,
    pub initial_selection: usize,
    pub options: Vec<DialogOption>,
}

pub fn option_event(index: usize) -> String {
    format!("DialogOption_{index}")
}

impl OptionDialog {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn option(mut self, option: DialogOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn initial_selection(mut self, row: usize) -> Self {
        self.initial_selection = row;
        self
    }

    /// Builds the dialog document and registers each option's callback.
    pub fn build(&self, callbacks: &CallbackRegistry) -> Document {
        let mut items = Element::new("items");
        for (index, option) in self.options.iter().enumerate() {
            let event = option_event(index);
            match &option.callback {
                Some(callback) => callbacks.register_handler(event.clone(), callback.clone()),
                None => tracing::warn!(target: "views", event = %event, "dialog option without callback"),
            }
            let spec = NodeSpec::named("oneLineMenuItem")
                .attr("id", event.clone())
                .attr("accessibilityLabel", option.label.clone())
                .attr(
                    "onSelect",
                    format!("DomViewManager.fireCallback('{event}');"),
                )
                .child(NodeSpec::named("label").text(option.label.clone()));
            if let Some(item) = create_node(&spec) {
                items.append_child(item);
            }
        }

        let header = Element::new("header").with_child(
            Element::new("simpleHeader")
                .with_attr(
                    "accessibilityLabel",
                    format!("{}. {}", self.title, self.description),
                )
                .with_child(Element::new("title").with_text(self.title.clone())),
        );
        let menu = Element::new("menu")
            .with_child(
                Element::new("initialSelection").with_child(
                    Element::new("row").with_text(self.initial_selection.to_string()),
                ),
            )
            .with_child(
                Element::new("sections")
                    .with_child(Element::new("menuSection").with_child(items)),
            );
        let dialog = Element::new("optionDialog")
            .with_attr("id", OPTION_DIALOG_ID)
            .with_child(header)
            .with_child(Element::new("description").with_text(self.description.clone()))
            .with_child(menu);

        Document::new(Element::new("atv").with_child(Element::new("body").with_child(dialog)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn builds_menu_items_wired_to_callbacks() {
        let callbacks = CallbackRegistry::new();
        let picked = Rc::new(RefCell::new(Vec::new()));
        let first = picked.clone();
        let second = picked.clone();
        let dialog = OptionDialog::new("Quit?", "Playback will stop")
            .initial_selection(1)
            .option(DialogOption::new("Yes").on_select(Rc::new(move |_, _| first.borrow_mut().push(0))))
            .option(DialogOption::new("No").on_select(Rc::new(move |_, _| second.borrow_mut().push(1))));

        let document = dialog.build(&callbacks);
        let root = document.root_element();
        assert_eq!(root.element_by_tag_name("title").unwrap().text_content(), "Quit?");
        assert_eq!(root.element_by_tag_name("row").unwrap().text_content(), "1");
        assert_eq!(
            root.element_by_tag_name("simpleHeader").unwrap().attr("accessibilityLabel"),
            Some("Quit?. Playback will stop")
        );

        let items = root.elements_by_tag_name("oneLineMenuItem");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].attr("id"), Some("DialogOption_1"));
        assert_eq!(
            items[1].attr("onSelect"),
            Some("DomViewManager.fireCallback('DialogOption_1');")
        );
        assert_eq!(items[1].element_by_tag_name("label").unwrap().text_content(), "No");

        callbacks.fire("DialogOption_1", &Value::Null);
        assert_eq!(*picked.borrow(), vec![1]);
    }
}
