pub mod onnx_model_loader;
