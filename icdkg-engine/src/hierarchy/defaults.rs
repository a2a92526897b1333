//! Built-in cardiovascular taxonomy

use serde_json::{json, Value};

pub(super) fn default_taxonomy() -> Value {
    json!({
        "410": {
            "name": "Acute myocardial infarction",
            "level": 1,
            "parent": null,
            "children": ["410.0", "410.1", "410.7", "410.9"]
        },
        "410.0": {
            "name": "Acute myocardial infarction of anterolateral wall",
            "level": 2,
            "parent": "410",
            "children": []
        },
        "410.1": {
            "name": "Acute myocardial infarction of other anterior wall",
            "level": 2,
            "parent": "410",
            "children": []
        },
        "410.7": {
            "name": "Subendocardial infarction",
            "level": 2,
            "parent": "410",
            "children": ["410.71"]
        },
        "410.71": {
            "name": "Subendocardial infarction, initial episode of care",
            "level": 3,
            "parent": "410.7",
            "children": []
        },
        "410.9": {
            "name": "Acute myocardial infarction of unspecified site",
            "level": 2,
            "parent": "410",
            "children": []
        },
        "412": {
            "name": "Old myocardial infarction",
            "level": 1,
            "parent": null,
            "children": []
        },
        "414": {
            "name": "Other forms of chronic ischemic heart disease",
            "level": 1,
            "parent": null,
            "children": ["414.0"]
        },
        "414.0": {
            "name": "Coronary atherosclerosis",
            "level": 2,
            "parent": "414",
            "children": ["414.01"]
        },
        "414.01": {
            "name": "Coronary atherosclerosis of native coronary artery",
            "level": 3,
            "parent": "414.0",
            "children": []
        },
        "424": {
            "name": "Other diseases of endocardium",
            "level": 1,
            "parent": null,
            "children": ["424.1"]
        },
        "424.1": {
            "name": "Aortic valve disorders",
            "level": 2,
            "parent": "424",
            "children": []
        },
        "427": {
            "name": "Cardiac dysrhythmias",
            "level": 1,
            "parent": null,
            "children": ["427.3"]
        },
        "427.3": {
            "name": "Atrial fibrillation and flutter",
            "level": 2,
            "parent": "427",
            "children": ["427.31"]
        },
        "427.31": {
            "name": "Atrial fibrillation",
            "level": 3,
            "parent": "427.3",
            "children": []
        },
        "428": {
            "name": "Heart failure",
            "level": 1,
            "parent": null,
            "children": ["428.0", "428.1"]
        },
        "428.0": {
            "name": "Congestive heart failure, unspecified",
            "level": 2,
            "parent": "428",
            "children": []
        },
        "428.1": {
            "name": "Left heart failure",
            "level": 2,
            "parent": "428",
            "children": []
        }
    })
}
